//! Error types for photo library operations.

use reqwest::StatusCode;

/// Result type alias for photo library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Photo library error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected HTTP status from the service.
    #[error("Service returned {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Response body, as far as it could be read.
        detail: String,
    },

    /// Authentication or authorization rejected.
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// Content rejected by the service (malformed media, bad request).
    #[error("Content rejected: {0}")]
    Rejected(String),

    /// No refresh token available for headless token refresh.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl Error {
    /// Whether retrying the same request may succeed.
    ///
    /// Network timeouts, connection failures, rate limiting (429), and
    /// server-side (5xx) responses are retryable; everything else is
    /// permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = Error::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            detail: String::new(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_server_error_is_retryable() {
        let err = Error::Status {
            status: StatusCode::BAD_GATEWAY,
            detail: String::new(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_auth_is_permanent() {
        assert!(!Error::Auth("expired grant".to_string()).is_retryable());
    }

    #[test]
    fn test_rejected_is_permanent() {
        assert!(!Error::Rejected("not an image".to_string()).is_retryable());
    }

    #[test]
    fn test_client_status_is_permanent() {
        let err = Error::Status {
            status: StatusCode::NOT_FOUND,
            detail: String::new(),
        };
        assert!(!err.is_retryable());
    }
}
