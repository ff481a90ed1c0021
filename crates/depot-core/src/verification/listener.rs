use serde::{Deserialize, Serialize};

use crate::verification::result::{VerificationCode, VerificationResult};

/// Answer to a verification prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerChoice {
    /// Stop the install as a user abort
    Abort,
    /// Stop the install as a verification failure
    Error,
    /// Accept this content only
    TrustOnce,
    /// Accept and trust the signer for the rest of the process
    TrustAlways,
}

/// Decides what happens to content whose verification result is not already trusted.
pub trait VerificationListener: Send + Sync {
    fn prompt(&self, result: &VerificationResult) -> ListenerChoice;
}

impl<F> VerificationListener for F
where
    F: Fn(&VerificationResult) -> ListenerChoice + Send + Sync,
{
    fn prompt(&self, result: &VerificationResult) -> ListenerChoice {
        self(result)
    }
}

/// Non-interactive trust decision, configured per application or per command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustPolicy {
    #[default]
    Never,
    Once,
    Always,
}

/// Listener answering every prompt from a [`TrustPolicy`].
///
/// Corrupted content and failed verifications are always refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyListener {
    policy: TrustPolicy,
}

impl PolicyListener {
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TrustPolicy {
        self.policy
    }
}

impl VerificationListener for PolicyListener {
    fn prompt(&self, result: &VerificationResult) -> ListenerChoice {
        let choice = match (result.code, self.policy) {
            (VerificationCode::Corrupted | VerificationCode::Error, _) => ListenerChoice::Error,
            (_, TrustPolicy::Never) => ListenerChoice::Abort,
            (_, TrustPolicy::Once) => ListenerChoice::TrustOnce,
            (_, TrustPolicy::Always) => ListenerChoice::TrustAlways,
        };
        log::debug!("{} -> {:?}", result, choice);
        choice
    }
}
