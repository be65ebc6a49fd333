//! Domain error taxonomy for the VEMAT core.
//!
//! Pure computations (date parsing, reading validation) fail with
//! [`VematError::InvalidArgument`] and are never retried. Dispatch failures
//! are retried by the dispatcher and only surface as
//! [`VematError::DispatchExhausted`] once the retry budget is spent.
//! Too few readings is not an error: the scanner simply returns no windows.

use thiserror::Error;

/// Errors produced by the alerting and aggregation core.
#[derive(Debug, Error)]
pub enum VematError {
    /// Malformed date, or a reading missing a required numeric field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A single notification attempt failed; eligible for retry.
    #[error("dispatch attempt failed: {0}")]
    DispatchTransientFailure(String),

    /// Every notification attempt failed.
    #[error("dispatch exhausted after {attempts} attempts: {last_error}")]
    DispatchExhausted { attempts: u32, last_error: String },

    /// The readings or alert store failed.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl VematError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        VematError::InvalidArgument(msg.into())
    }
}

pub type Result<T, E = VematError> = std::result::Result<T, E>;
