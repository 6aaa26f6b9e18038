//! Platform error types

use thiserror::Error;

use crate::clock::ListenerId;

/// Errors reported by collaborator implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The clock source could not be reached (no display event connection)
    #[error("Clock source unavailable: {0}")]
    ClockUnavailable(String),

    /// A listener id was used after it was unregistered
    #[error("Unknown clock listener: {0:?}")]
    UnknownListener(ListenerId),

    /// The clock's event thread has already shut down
    #[error("Clock stopped")]
    ClockStopped,
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
