//! Error type shared by every call into the indicator backend.

use thiserror::Error;

/// Failures from any data source, normalized into a single kind.
///
/// Transport problems, HTTP failures, validation failures, unexpected
/// response shapes and snapshot read errors all surface through this enum.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered with a non-success status
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        body: serde_json::Value,
    },

    /// The request never produced a usable response (DNS, connect, bad JSON)
    #[error("Network error: {0}")]
    Network(String),

    /// Parameters rejected before any request was sent
    #[error("{0}")]
    Validation(String),

    /// The response parsed as JSON but lacks expected fields
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Reading the local snapshot failed
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl ApiError {
    /// Numeric HTTP status, 0 when no HTTP exchange completed.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Http { status, .. } => *status,
            _ => 0,
        }
    }

    /// Raw body of an HTTP failure
    #[allow(dead_code)] // Used in tests
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            ApiError::Http { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
