//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Running out of retries is not an error; it is reported through
/// [`ReadOutcome`](crate::ReadOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The channel failed to accept a command.
    #[error("channel error: {message}")]
    Channel {
        /// Error message.
        message: String,
        /// Whether the command can be retried.
        retryable: bool,
    },

    /// The channel is not connected.
    #[error("command channel not connected")]
    NotConnected,

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request could not be expressed as a command.
    #[error("protocol error: {0}")]
    Protocol(#[from] linkdb_sync_protocol::ProtocolError),

    /// No Tokio runtime to run the engine on.
    #[error("sync engine requires a Tokio runtime")]
    NoRuntime,

    /// The engine was dropped before the read finished.
    #[error("read task dropped before completing")]
    TaskDropped,
}

impl SyncError {
    /// Creates a retryable channel error.
    pub fn channel_retryable(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable channel error.
    pub fn channel_fatal(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the failed command can simply be sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Channel { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
