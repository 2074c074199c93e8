use thiserror::Error;

/// Unified error type for the request client.
///
/// All variants own their payloads and the type is `Clone`, so a failure
/// produced by one in-flight request can be handed to every caller that was
/// deduplicated onto it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("HTTP {status} {status_text}")]
    HttpStatus {
        status: u16,
        status_text: String,
        body: Option<String>,
    },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl Error {
    /// HTTP status code, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt at the same request may succeed.
    ///
    /// Timeouts, transport-level failures and 5xx responses are transient.
    /// 4xx responses and explicit cancellation are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::Network { .. } => true,
            Error::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout { ms: 0 }
        } else {
            Error::Network {
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn serialization(err: serde_json::Error) -> Self {
        Error::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> Error {
        Error::HttpStatus {
            status,
            status_text: String::new(),
            body: None,
        }
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(Error::Timeout { ms: 100 }.is_retryable());
        assert!(Error::Network {
            message: "connection refused".into()
        }
        .is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
    }

    #[test]
    fn client_errors_and_cancellation_are_final() {
        assert!(!http(400).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(!http(429).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn status_is_exposed_only_for_http_failures() {
        assert_eq!(http(404).status(), Some(404));
        assert_eq!(Error::Cancelled.status(), None);
    }
}
