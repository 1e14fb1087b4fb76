//! Error handling module for dispatch-timer.

use thiserror::Error;

/// Custom error type for timer operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// `resume` called on a timer source that is not suspended.
    #[error("Resume called on a timer source that is not suspended.")]
    NotSuspended,

    /// Callback execution failed.
    #[error("Callback execution failed: {0}")]
    CallbackError(String),
}
