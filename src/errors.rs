use std::time::Duration;

use http::StatusCode;

use crate::transport::{Role, TransportError};

/// Why a single attempt was rejected as a retryable failure.
#[derive(thiserror::Error, Debug)]
pub enum AttemptError {
    /// The backend answered with a 5xx status.
    #[error("server responded {0}")]
    Status(StatusCode),

    /// The exchange failed before a status was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A failed branch of a race, kept for observability.
#[derive(Debug)]
pub struct BranchFailure {
    pub role: Role,
    pub error: AttemptError,
}

/// Errors that can occur during a hedged request.
#[derive(thiserror::Error, Debug)]
pub enum HedgedError {
    /// The caller's abort signal fired, before dispatch or mid-race.
    ///
    /// Carries the reason supplied to the signal.
    #[error("request cancelled: {reason}")]
    Cancelled { reason: String },

    /// The request's deadline elapsed before any attempt was accepted.
    #[error("hedged call timed out after {0:?}")]
    Timeout(Duration),

    /// Every live attempt ended in a server or transport failure.
    ///
    /// The individual failures are kept in `failures`, in the order they
    /// were observed.
    #[error("service unavailable: all {} live attempt(s) failed", failures.len())]
    ServiceUnavailable { failures: Vec<BranchFailure> },
}

impl HedgedError {
    /// Per-branch failures behind a [`HedgedError::ServiceUnavailable`].
    pub fn failures(&self) -> &[BranchFailure] {
        match self {
            HedgedError::ServiceUnavailable { failures } => failures,
            _ => &[],
        }
    }
}
