//! Error types for LinkDB core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building or decoding records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Device address text could not be parsed.
    #[error("invalid device address: {input:?}")]
    InvalidAddress {
        /// The rejected input.
        input: String,
    },

    /// Record body has the wrong length.
    #[error("invalid record length: expected {expected} bytes, got {actual}")]
    InvalidRecordLength {
        /// Required length.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },
}

impl CoreError {
    /// Creates an invalid address error.
    pub fn invalid_address(input: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
        }
    }
}
