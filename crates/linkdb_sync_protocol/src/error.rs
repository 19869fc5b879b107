//! Protocol errors.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or interpreting protocol values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Record count does not fit the command.
    #[error("record count {count} exceeds the per-command limit of {max}")]
    CountTooLarge {
        /// Requested count.
        count: u16,
        /// Largest count a single command can carry.
        max: u16,
    },
}
