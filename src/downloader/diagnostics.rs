// Rejection diagnostics - classifies bilibili API error codes
//
// The API reports business failures through the `code` field of its JSON
// envelope. A handful of codes are common enough to deserve a readable
// explanation for whoever renders the error.

use serde::{Deserialize, Serialize};

/// Known reasons the API refuses a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiRejection {
    /// -400: malformed query parameters
    BadRequest,

    /// -403: access denied for this client
    AccessDenied,

    /// -404: the video does not exist
    NotFound,

    /// -412: request intercepted by risk control (too many requests)
    Intercepted,

    /// 62002: the video is hidden
    Invisible,

    /// 62004: the video is still under review
    UnderReview,

    /// 62012: only the uploader can see the video
    UploaderOnly,
}

impl ApiRejection {
    /// Check if waiting and retrying later might help
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Intercepted | Self::UnderReview)
    }

    /// Check if the video can never be fetched by an anonymous client
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound | Self::Invisible | Self::UploaderOnly)
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::BadRequest => "request parameters were rejected",
            Self::AccessDenied => "access denied",
            Self::NotFound => "video does not exist",
            Self::Intercepted => "request intercepted, try again later",
            Self::Invisible => "video is not visible",
            Self::UnderReview => "video is under review",
            Self::UploaderOnly => "video is visible to its uploader only",
        }
    }
}

/// Map an API envelope code to a known rejection reason.
pub fn diagnose_api_code(code: i64) -> Option<ApiRejection> {
    match code {
        -400 => Some(ApiRejection::BadRequest),
        -403 => Some(ApiRejection::AccessDenied),
        -404 => Some(ApiRejection::NotFound),
        -412 => Some(ApiRejection::Intercepted),
        62002 => Some(ApiRejection::Invisible),
        62004 => Some(ApiRejection::UnderReview),
        62012 => Some(ApiRejection::UploaderOnly),
        _ => None,
    }
}
