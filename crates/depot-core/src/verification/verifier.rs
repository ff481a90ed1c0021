use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::io::{self, Read};
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::content::reference::ContentReference;
use crate::kernel::error::Result;
use crate::model::Feature;
use crate::monitor::ProgressMonitor;
use crate::storage::{ConfigFormat, StorageProvider};
use crate::verification::result::{VerificationCode, VerificationResult};

/// Inspects fetched content before it is stored.
pub trait Verifier: Send + Sync + Debug {
    /// Verify one locally resolved reference.
    ///
    /// `None` means the content is accepted without asking anyone.
    fn verify(
        &self,
        feature: &Feature,
        reference: &ContentReference,
        is_feature_verification: bool,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Option<VerificationResult>>;

    fn is_trusted(&self, signer: &str) -> bool;

    fn remember_trusted(&self, signer: &str);
}

/// Signers trusted for the lifetime of the process.
#[derive(Debug, Default)]
pub struct TrustStore {
    signers: RwLock<HashSet<String>>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, signer: &str) -> bool {
        self.signers.read().map(|s| s.contains(signer)).unwrap_or(false)
    }

    pub fn trust(&self, signer: &str) {
        if let Ok(mut signers) = self.signers.write() {
            if signers.insert(signer.to_string()) {
                log::info!("Signer '{}' trusted for this session", signer);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.signers.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expected SHA-256 digests of a site's content, vouched for by one signer.
///
/// Keys are content identifiers such as `plugins/org.example.a_1.0.0.jar`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestManifest {
    pub signer: String,
    #[serde(default)]
    pub digests: BTreeMap<String, String>,
}

impl DigestManifest {
    pub fn new(signer: impl Into<String>) -> Self {
        Self { signer: signer.into(), digests: BTreeMap::new() }
    }

    pub fn with_digest(mut self, identifier: impl Into<String>, digest: impl Into<String>) -> Self {
        self.digests.insert(identifier.into(), digest.into().to_ascii_lowercase());
        self
    }

    /// Load a manifest; the format follows the file extension, json by default.
    pub fn load(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).unwrap_or(ConfigFormat::Json);
        let data = provider.read_to_string(path)?;
        format.deserialize(&data)
    }

    pub fn digest_for(&self, identifier: &str) -> Option<&str> {
        self.digests.get(identifier).map(String::as_str)
    }
}

/// Hex SHA-256 of everything `reader` yields.
pub fn sha256_hex(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Checks content against a [`DigestManifest`].
///
/// Trust is looked up in this verifier's store first, then in its parent's.
#[derive(Debug)]
pub struct ChecksumVerifier {
    manifest: DigestManifest,
    trust: Arc<TrustStore>,
    parent: Option<Arc<dyn Verifier>>,
}

impl ChecksumVerifier {
    pub fn new(manifest: DigestManifest, trust: Arc<TrustStore>) -> Self {
        Self { manifest, trust, parent: None }
    }

    pub fn with_parent(mut self, parent: Arc<dyn Verifier>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn manifest(&self) -> &DigestManifest {
        &self.manifest
    }
}

impl Verifier for ChecksumVerifier {
    fn verify(
        &self,
        feature: &Feature,
        reference: &ContentReference,
        is_feature_verification: bool,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Option<VerificationResult>> {
        let identifier = reference.identifier();
        monitor.sub_task(&format!("Verifying {}", identifier));
        let result = |code| {
            VerificationResult::new(code, identifier, feature.identifier.to_string())
                .for_feature(is_feature_verification)
        };

        let Some(expected) = self.manifest.digest_for(identifier) else {
            log::debug!("No digest for '{}'", identifier);
            return Ok(Some(result(VerificationCode::Unsigned)));
        };

        let actual = match reference.input_stream().map_err(io::Error::other).and_then(sha256_hex) {
            Ok(digest) => digest,
            Err(e) => {
                log::warn!("Could not digest '{}': {}", identifier, e);
                return Ok(Some(result(VerificationCode::Error).with_detail(e.to_string())));
            }
        };

        let signer = self.manifest.signer.as_str();
        if !actual.eq_ignore_ascii_case(expected) {
            log::warn!("Digest mismatch for '{}'", identifier);
            return Ok(Some(
                result(VerificationCode::Corrupted)
                    .signed_by(signer)
                    .with_detail(format!("expected {}, found {}", expected, actual)),
            ));
        }

        if self.is_trusted(signer) {
            return Ok(None);
        }
        Ok(Some(result(VerificationCode::Signed).signed_by(signer)))
    }

    fn is_trusted(&self, signer: &str) -> bool {
        self.trust.contains(signer) || self.parent.as_ref().is_some_and(|p| p.is_trusted(signer))
    }

    fn remember_trusted(&self, signer: &str) {
        self.trust.trust(signer);
    }
}
