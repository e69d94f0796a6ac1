//! Error types for shepherd-github

use thiserror::Error;

/// Errors that can occur while talking to the source-control host
#[derive(Error, Debug)]
pub enum OracleError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The host answered with a non-success status
    #[error("{operation} failed with HTTP {status}: {message}")]
    Status {
        operation: String,
        status: u16,
        message: String,
    },

    /// The host answered 2xx but the body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Client could not be built from the supplied configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        OracleError::Decode(err.to_string())
    }
}
