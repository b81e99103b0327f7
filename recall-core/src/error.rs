//! Core error types

use thiserror::Error;

/// Core Result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by domain invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Sequence state transition not allowed
    #[error("Invalid sequence transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Step numbering broken within a campaign
    #[error("Invalid campaign steps: {0}")]
    InvalidSteps(String),

    /// Generic validation failure
    #[error("Validation error: {0}")]
    Validation(String),
}

impl CoreError {
    /// Create an invalid transition error
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }
}
