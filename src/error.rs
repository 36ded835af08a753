//! Error types for stream stages
//!
//! Every failure a stage can report travels as a [`StreamError`]. A stage
//! reports at most one error; it is terminal for that stage and for every
//! stage downstream of it.

use thiserror::Error;

/// Main error type for stage operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Failure raised by user supplied logic (producer, transform or predicate)
    #[error("{0}")]
    Custom(String),
    /// A panic captured by an isolation boundary
    #[error("stage panicked: {0}")]
    Panicked(String),
    /// The result slot was dropped before anything settled it
    #[error("operation cancelled")]
    Cancelled,
    /// A stage received a hook it does not implement
    #[error("stage does not support {0}")]
    Unsupported(&'static str),
    /// I/O related errors
    #[error("IO error: {0}")]
    IO(String),
}

impl StreamError {
    /// Build a [`StreamError::Custom`] from any message
    pub fn custom(msg: impl Into<String>) -> Self {
        StreamError::Custom(msg.into())
    }
}

impl From<&str> for StreamError {
    fn from(msg: &str) -> Self {
        StreamError::Custom(msg.to_string())
    }
}

impl From<String> for StreamError {
    fn from(msg: String) -> Self {
        StreamError::Custom(msg)
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::IO(err.to_string())
    }
}

/// Result type for stage operations
pub type StreamResult<T> = Result<T, StreamError>;
