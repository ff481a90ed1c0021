//! # Depot Core Install Errors
//!
//! Errors raised by install transactions and the handler lifecycle.
//! [`InstallError::Failed`] is the single wrapper the orchestrator puts around
//! whatever stopped a transaction, keeping the first error as its cause.
use thiserror::Error;

use crate::install::state::InstallState;
use crate::kernel::error::Error;
use crate::verification::VerificationResult;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Install aborted: {result}")]
    Aborted { result: Box<VerificationResult> },

    #[error("Verification failed: {result}")]
    Verification { result: Box<VerificationResult> },

    #[error("Install canceled")]
    Canceled,

    #[error("No install handler registered under '{0}'")]
    UnknownHandler(String),

    #[error("Illegal install transition from {from:?} to {to:?}")]
    IllegalTransition { from: InstallState, to: InstallState },

    #[error("Install of '{feature}' failed: {cause}{}", unwind_note(.unwind))]
    Failed {
        feature: String,
        #[source]
        cause: Box<Error>,
        /// Failure while undoing the transaction, reported after the cause
        unwind: Option<Box<Error>>,
    },
}

fn unwind_note(unwind: &Option<Box<Error>>) -> String {
    match unwind {
        Some(e) => format!(" (cleanup also failed: {})", e),
        None => String::new(),
    }
}

impl InstallError {
    /// The verification result behind an abort or verification failure
    pub fn verification_result(&self) -> Option<&VerificationResult> {
        match self {
            InstallError::Aborted { result } | InstallError::Verification { result } => Some(result.as_ref()),
            InstallError::Failed { cause, .. } => match cause.as_ref() {
                Error::Install(inner) => inner.verification_result(),
                _ => None,
            },
            _ => None,
        }
    }
}
