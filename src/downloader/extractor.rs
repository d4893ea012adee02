// Video id extraction from user-supplied links

use regex::Regex;

use super::errors::DownloadError;
use super::models::ContentIdentifier;

lazy_static::lazy_static! {
    static ref BVID_RE: Regex = Regex::new(r"video/(BV[0-9a-zA-Z]+)").unwrap();
}

/// Pull the `BV...` identifier out of a video page link.
///
/// The first `video/BV...` occurrence wins and is returned verbatim. Pure
/// function, no I/O.
pub fn extract(raw_url: &str) -> Result<ContentIdentifier, DownloadError> {
    BVID_RE
        .captures(raw_url)
        .and_then(|caps| caps.get(1))
        .map(|m| ContentIdentifier::new(m.as_str().to_string()))
        .ok_or_else(|| DownloadError::ExtractionFailure(raw_url.to_string()))
}
