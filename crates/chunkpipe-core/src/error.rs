//! Unified error handling for chunkpipe-core

use thiserror::Error;

/// Core error type for chunkpipe-core
#[derive(Error, Debug)]
pub enum Error {
    /// Endpoint or credential missing. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote service rejected the request because prompt + content
    /// exceed its context window.
    #[error("Token limit exceeded: {0}")]
    TokenLimitExceeded(String),

    /// HTTP 429 that outlived the configured retry budget.
    #[error("Rate limited by upstream (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// Non-2xx response or a body without a completion.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Request sent, no response received.
    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File-level failure surfaced by the file processor.
    #[error("Failed to process {file}: {message}")]
    Processing { file: String, message: String },
}

/// Result type alias for chunkpipe-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a token-limit error
    pub fn token_limit(msg: impl Into<String>) -> Self {
        Error::TokenLimitExceeded(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(status: u16, msg: impl Into<String>) -> Self {
        Error::Upstream {
            status,
            message: msg.into(),
        }
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Create a file-level processing error
    pub fn processing(file: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Processing {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Whether the client retries this failure on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Network("Request timed out".to_string())
        } else if err.is_connect() {
            Error::Network(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            Error::upstream(status.as_u16(), err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

// Convert to String for front-end error reporting
impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::configuration("API key not set");
        assert_eq!(err.to_string(), "Configuration error: API key not set");

        let err = Error::upstream(502, "bad gateway");
        assert_eq!(err.to_string(), "Upstream error (502): bad gateway");
    }

    #[test]
    fn test_processing_error_names_file() {
        let err = Error::processing("notes.srt", "disk full");
        assert_eq!(err.to_string(), "Failed to process notes.srt: disk full");
    }

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(Error::RateLimited { retry_after_secs: 60 }.is_retryable());
        assert!(!Error::token_limit("too long").is_retryable());
        assert!(!Error::network("reset").is_retryable());
        assert!(!Error::configuration("missing").is_retryable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_conversion_to_string() {
        let err = Error::network("connection reset");
        let s: String = err.into();
        assert!(s.contains("Network error"));
    }
}
