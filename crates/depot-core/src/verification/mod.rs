//! # Depot Core Verification
//!
//! Content verification during install. A [`Verifier`] inspects each fetched
//! reference and may produce a [`VerificationResult`]; the install orchestrator
//! hands results that are not already trusted to a [`VerificationListener`],
//! whose [`ListenerChoice`] decides whether the transaction continues.
//!
//! Trust granted with [`ListenerChoice::TrustAlways`] lives in a [`TrustStore`]
//! for the lifetime of the application instance and is never persisted.
pub mod listener;
pub mod result;
pub mod verifier;

pub use listener::{ListenerChoice, PolicyListener, TrustPolicy, VerificationListener};
pub use result::{VerificationCode, VerificationResult};
pub use verifier::{sha256_hex, ChecksumVerifier, DigestManifest, TrustStore, Verifier};
