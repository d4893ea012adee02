// Error types for the resolution pipeline and the stream downloader

use std::fmt;

use super::diagnostics::{diagnose_api_code, ApiRejection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// Input link carries no `video/BV...` identifier
    ExtractionFailure(String),

    /// Remote answered with a non-success HTTP status
    Transport { status: u16, context: String },

    /// Request never produced a response (DNS, TLS, refused connection)
    Network(String),

    /// Request or chunk wait exceeded the configured timeout
    NetworkTimeout,

    /// HTTP succeeded but the API envelope carried `code != 0`
    Application { code: i64, message: String },

    /// Body did not match the expected JSON shape
    MalformedResponse(String),

    /// Media connection failed, stalled or broke mid-body
    Stream(String),

    /// Writing to the destination failed
    Io(String),
}

impl DownloadError {
    pub fn transport(status: u16, context: impl Into<String>) -> Self {
        Self::Transport {
            status,
            context: context.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Media request failed before a status came back (connect, TLS, reset).
    pub fn media(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::transport(status.as_u16(), "media"),
            None => Self::Stream(e.to_string()),
        }
    }

    /// Failures raised by the media transfer itself rather than by resolution.
    pub fn is_download_failure(&self) -> bool {
        matches!(self, Self::Stream(_) | Self::Io(_))
            || matches!(self, Self::Transport { context, .. } if context == "media")
    }

    /// Known classification of an application error code, if any.
    pub fn rejection(&self) -> Option<ApiRejection> {
        match self {
            Self::Application { code, .. } => diagnose_api_code(*code),
            _ => None,
        }
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtractionFailure(input) => {
                write!(f, "Could not extract a video id from: {}", input)
            }
            Self::Transport { status, context } => {
                write!(f, "{} request failed with status code {}", context, status)
            }
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::NetworkTimeout => write!(f, "Network timeout: bilibili is not responding"),
            Self::Application { code, message } => {
                write!(f, "API returned error {}: {}", code, message)?;
                if let Some(reason) = diagnose_api_code(*code) {
                    write!(f, " ({})", reason.description())?;
                }
                Ok(())
            }
            Self::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Self::Stream(msg) => write!(f, "Download interrupted: {}", msg),
            Self::Io(msg) => write!(f, "Write error: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::NetworkTimeout;
        }
        if e.is_decode() {
            return Self::MalformedResponse(e.to_string());
        }
        if let Some(status) = e.status() {
            return Self::transport(status.as_u16(), "HTTP");
        }
        Self::Network(e.to_string())
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message_has_status() {
        let err = DownloadError::transport(412, "metadata");
        assert!(err.to_string().contains("412"));
        assert!(!err.is_download_failure());
    }

    #[test]
    fn test_application_message_passthrough() {
        let err = DownloadError::Application {
            code: -404,
            message: "啥都木有".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("啥都木有"));
        assert_eq!(err.rejection(), Some(ApiRejection::NotFound));
    }

    #[test]
    fn test_download_failure_grouping() {
        assert!(DownloadError::Io("disk full".into()).is_download_failure());
        assert!(DownloadError::Stream("reset".into()).is_download_failure());
        assert!(DownloadError::transport(403, "media").is_download_failure());
        assert!(DownloadError::Stream("no data".into()).is_download_failure());
        assert!(!DownloadError::NetworkTimeout.is_download_failure());
        assert!(!DownloadError::Network("refused".into()).is_download_failure());
    }
}
