//! Session and API error types.

/// Errors from the session and its endpoint calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    /// 4xx from the service. Never retried.
    #[error("client error {status}: {message}")]
    Client { status: u16, message: String },

    /// 500-504 from the service. Retry-eligible, but retrying is up to the caller.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unexpected status {status}: {message}")]
    UnknownStatus { status: u16, message: String },
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Client { status, .. }
            | Error::Server { status, .. }
            | Error::UnknownStatus { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the same call may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Server { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_retry_classification() {
        let client = Error::Client {
            status: 404,
            message: "not found".into(),
        };
        assert_eq!(client.status(), Some(404));
        assert!(!client.is_retryable());

        let server = Error::Server {
            status: 503,
            message: "try later".into(),
        };
        assert_eq!(server.status(), Some(503));
        assert!(server.is_retryable());

        let auth = Error::Authentication("no token".into());
        assert_eq!(auth.status(), None);
        assert!(!auth.is_retryable());
    }

    #[test]
    fn display_keeps_server_message() {
        let err = Error::Client {
            status: 400,
            message: "expected at least 1 part".into(),
        };
        assert_eq!(err.to_string(), "client error 400: expected at least 1 part");
    }
}
