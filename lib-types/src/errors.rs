//! Core Errors
//!
//! Every state-mutating call aborts with one of these and leaves state untouched.

use thiserror::Error;

/// Error returned by ledger, rotation and governance operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller lacks the role the operation requires
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Zero amount, null address, out-of-range duration/threshold/kind, bad lengths
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Double vote, double finalize, acting outside a window or phase, ballot cap reached
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Operation attempted before one-time setup completed
    #[error("Not initialized: {0}")]
    Uninitialized(&'static str),

    /// Backend or codec failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn state_conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }

    /// Short classification used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::AccessDenied(_) => "access_denied",
            CoreError::InvalidArgument(_) => "invalid_argument",
            CoreError::StateConflict(_) => "state_conflict",
            CoreError::Uninitialized(_) => "uninitialized",
            CoreError::Storage(_) => "storage",
        }
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
