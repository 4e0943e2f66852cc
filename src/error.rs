//! Error handling for the finlight client.

use std::time::Duration;

use thiserror::Error;

/// The result type used throughout the crate.
pub type FinlightResult<T> = Result<T, FinlightError>;

/// Error type covering all client operations.
#[derive(Error, Debug)]
pub enum FinlightError {
    /// HTTP request errors (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success API response that was not retried away
    #[error("API error: status={status}, body={body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Rate limiting errors
    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// WebSocket errors
    #[error("WebSocket error: {message}")]
    WebSocket { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Timeout errors
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Webhook signature verification failures
    #[error("Signature error: {message}")]
    Signature { message: String },

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<tokio_tungstenite::tungstenite::Error> for FinlightError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket {
            message: e.to_string(),
        }
    }
}

impl FinlightError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a WebSocket error.
    pub fn websocket(message: impl Into<String>) -> Self {
        Self::WebSocket {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a rate limit error.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a signature error.
    pub fn signature(message: impl Into<String>) -> Self {
        Self::Signature {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an API error.
    pub fn api(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = FinlightError::config("Invalid URL");
        assert!(matches!(err, FinlightError::Config { .. }));

        let err = FinlightError::timeout(Duration::from_secs(5));
        assert!(matches!(err, FinlightError::Timeout { .. }));

        let err = FinlightError::signature("digest mismatch");
        assert!(matches!(err, FinlightError::Signature { .. }));

        let err = FinlightError::rate_limited(Some(Duration::from_secs(60)));
        assert!(matches!(
            err,
            FinlightError::RateLimited {
                retry_after: Some(_)
            }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = FinlightError::websocket("connection reset");
        assert_eq!(err.to_string(), "WebSocket error: connection reset");
    }
}
