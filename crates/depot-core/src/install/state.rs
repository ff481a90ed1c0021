use std::fmt;

use crate::install::error::InstallError;

/// Phases of an install transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    Initiated,
    FetchFeatureArchive,
    VerifyFeature,
    FetchPlugins,
    VerifyPlugins,
    FetchNonPluginData,
    Store,
    HandlerComplete,
    Committed,
    Aborted,
}

impl InstallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstallState::Committed | InstallState::Aborted)
    }

    pub fn can_advance_to(self, next: InstallState) -> bool {
        use InstallState::*;
        if next == Aborted {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Initiated, FetchFeatureArchive)
                | (FetchFeatureArchive, VerifyFeature)
                | (VerifyFeature, FetchPlugins)
                | (VerifyFeature, FetchNonPluginData)
                | (FetchPlugins, VerifyPlugins)
                | (VerifyPlugins, FetchPlugins)
                | (VerifyPlugins, FetchNonPluginData)
                | (FetchNonPluginData, Store)
                | (Store, HandlerComplete)
                | (HandlerComplete, Committed)
        )
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one transaction through its states, rejecting illegal moves.
#[derive(Debug)]
pub struct InstallTransaction {
    feature: String,
    state: InstallState,
    visited: Vec<InstallState>,
}

impl InstallTransaction {
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            state: InstallState::Initiated,
            visited: vec![InstallState::Initiated],
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    /// States entered so far, in order
    pub fn visited(&self) -> &[InstallState] {
        &self.visited
    }

    pub fn advance(&mut self, next: InstallState) -> Result<(), InstallError> {
        if !self.state.can_advance_to(next) {
            return Err(InstallError::IllegalTransition { from: self.state, to: next });
        }
        log::debug!("{}: {} -> {}", self.feature, self.state, next);
        self.state = next;
        self.visited.push(next);
        Ok(())
    }
}
