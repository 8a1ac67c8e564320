//! Error types for critical section misuse.

use thiserror::Error;

/// Ways a caller can break the disable/restore contract.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// Restore was called before any disable constructed the domain.
    #[error("critical section restored before it was ever entered")]
    NotInitialized,

    /// Restore was called by a thread that does not hold the domain.
    #[error("critical section restored by a thread that does not hold it")]
    NotHeld,

    /// Eager initialization was requested after the domain already existed.
    #[error("critical section domain is already initialized")]
    AlreadyInitialized,
}

/// Result type for checked critical section operations.
pub type Result<T> = core::result::Result<T, PortError>;
