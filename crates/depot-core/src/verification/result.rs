use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of verifying one piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationCode {
    /// Intact and signed by a signer that is not trusted yet
    Signed,
    /// No signature or digest covers the content
    Unsigned,
    /// The content does not match its digest
    Corrupted,
    /// Covered by a signature scheme this verifier does not understand
    Unrecognized,
    /// Verification itself failed
    Error,
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationCode::Signed => "signed",
            VerificationCode::Unsigned => "unsigned",
            VerificationCode::Corrupted => "corrupted",
            VerificationCode::Unrecognized => "unrecognized",
            VerificationCode::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub code: VerificationCode,
    pub signer: Option<String>,
    /// Identifier of the verified content reference
    pub reference: String,
    /// Feature being installed
    pub feature: String,
    /// Whether the content belongs to the feature itself rather than a plugin
    pub feature_verification: bool,
    pub detail: Option<String>,
}

impl VerificationResult {
    pub fn new(code: VerificationCode, reference: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            code,
            signer: None,
            reference: reference.into(),
            feature: feature.into(),
            feature_verification: false,
            detail: None,
        }
    }

    pub fn signed_by(mut self, signer: impl Into<String>) -> Self {
        self.signer = Some(signer.into());
        self
    }

    pub fn for_feature(mut self, feature_verification: bool) -> Self {
        self.feature_verification = feature_verification;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' of feature '{}' is {}", self.reference, self.feature, self.code)?;
        if let Some(signer) = &self.signer {
            write!(f, " (signer '{}')", signer)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}
