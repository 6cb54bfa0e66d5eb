//! Maps low-level sink failures and URL problems onto the closed playback
//! error taxonomy, and decides how each kind is recovered.

use crate::resource::Expiration;
use crate::sink::SinkFailure;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    DecodeError,
    UnsupportedFormat,
    UrlExpired,
    NotFound,
    Unknown,
}

/// What happens after an error of a given code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Recovery {
    /// Shown with a retry action that re-attaches the sink.
    Retry,
    /// Refreshed behind the scenes; only surfaced if the refresh fails.
    AutoRefresh,
    /// Shown with no retry beyond a page reload.
    Terminal,
}

impl ErrorCode {
    pub fn recovery(&self) -> Recovery {
        match self {
            ErrorCode::UrlExpired => Recovery::AutoRefresh,
            ErrorCode::UnsupportedFormat | ErrorCode::NotFound => Recovery::Terminal,
            ErrorCode::NetworkError | ErrorCode::DecodeError | ErrorCode::Unknown => {
                Recovery::Retry
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::DecodeError => "DECODE_ERROR",
            ErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ErrorCode::UrlExpired => "URL_EXPIRED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Fixed user-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "The video could not be loaded. Check your connection and try again.",
            ErrorCode::DecodeError => "The video stopped playing because it could not be decoded.",
            ErrorCode::UnsupportedFormat => "This video format is not supported by your browser.",
            ErrorCode::UrlExpired => "The video link has expired.",
            ErrorCode::NotFound => "The video for this hand could not be found.",
            ErrorCode::Unknown => "Something went wrong while playing the video.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackError {
    pub code: ErrorCode,
    pub message: String,
    /// Opaque diagnostic string, not meant for display.
    pub details: String,
}

impl PlaybackError {
    pub fn new(code: ErrorCode, details: impl Into<String>) -> Self {
        Self {
            code,
            message: code.message().to_string(),
            details: details.into(),
        }
    }

    pub fn recovery(&self) -> Recovery {
        self.code.recovery()
    }

    pub fn is_terminal(&self) -> bool {
        self.recovery() == Recovery::Terminal
    }
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.code, self.message, self.details)
    }
}

/// Classifies a sink failure. An expired URL turns transport-level failures
/// into `URL_EXPIRED`, since the signature is the likely cause.
pub fn classify(failure: &SinkFailure, expiration: Expiration) -> PlaybackError {
    let code = match failure {
        SinkFailure::Decode(_) => ErrorCode::DecodeError,
        SinkFailure::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
        SinkFailure::Http { status, .. } => match status {
            401 | 403 => ErrorCode::UrlExpired,
            404 | 410 => ErrorCode::NotFound,
            500..=599 => ErrorCode::NetworkError,
            _ => ErrorCode::Unknown,
        },
        SinkFailure::Network(_) | SinkFailure::Stalled => ErrorCode::NetworkError,
        SinkFailure::Other(msg) if mentions_expiry(msg) => ErrorCode::UrlExpired,
        SinkFailure::Aborted | SinkFailure::Other(_) => ErrorCode::Unknown,
    };

    let code = match code {
        ErrorCode::NetworkError | ErrorCode::Unknown if expiration == Expiration::Expired => {
            ErrorCode::UrlExpired
        }
        code => code,
    };

    PlaybackError::new(code, failure.details())
}

/// The URL is known to be expired before anything was sent to the sink.
pub fn expired(url: &str, seconds_past: f64) -> PlaybackError {
    PlaybackError::new(
        ErrorCode::UrlExpired,
        format!("{} expired {:.0}s ago", url, seconds_past.max(0.0)),
    )
}

/// A refresh that failed is surfaced as a network error and never loops
/// back into another automatic refresh.
pub fn refresh_failed(details: impl fmt::Display) -> PlaybackError {
    PlaybackError::new(ErrorCode::NetworkError, format!("refresh failed: {}", details))
}

fn mentions_expiry(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("expired") || msg.contains("signature") || msg.contains("forbidden")
}
