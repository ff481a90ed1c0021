use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    InvalidFormat(String),
    ParseError(String),
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidFormat(v) => write!(f, "Invalid version format '{}'", v),
            VersionError::ParseError(msg) => write!(f, "Version parse error: {}", msg),
        }
    }
}

impl std::error::Error for VersionError {}

/// Parse a feature or plugin version.
///
/// Accepts `1`, `1.2`, `1.2.3` and `1.2.3.qualifier`. Missing numeric segments
/// are zero. The qualifier is carried as semver build metadata; `Version`
/// compares it after the numeric segments, so `1.0.0` sorts before
/// `1.0.0.v2024` and qualifiers order lexically among themselves.
pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    let version = version.trim();
    if version.is_empty() {
        return Err(VersionError::InvalidFormat(version.to_string()));
    }
    let mut parts = version.splitn(4, '.');
    let mut numbers = [0u64; 3];
    for slot in numbers.iter_mut() {
        match parts.next() {
            Some(part) => {
                *slot = part.parse::<u64>()
                    .map_err(|e| VersionError::ParseError(format!("'{}' in '{}': {}", part, version, e)))?;
            }
            None => break,
        }
    }
    let mut parsed = Version::new(numbers[0], numbers[1], numbers[2]);
    if let Some(qualifier) = parts.next() {
        let sanitized: String = qualifier
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
            .collect();
        parsed.build = BuildMetadata::new(&sanitized)
            .map_err(|e| VersionError::ParseError(format!("qualifier '{}': {}", qualifier, e)))?;
    }
    Ok(parsed)
}

/// Identifier plus version of a feature or plugin.
///
/// Equality, hashing and ordering use both parts. Displayed as `id_version`,
/// which is also the on-disk name of installed features and plugins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedIdentifier {
    pub id: String,
    #[serde(serialize_with = "serialize_version", deserialize_with = "deserialize_version")]
    pub version: Version,
}

impl VersionedIdentifier {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self { id: id.into(), version }
    }

    /// Build from an id and a lenient version string.
    pub fn parse(id: impl Into<String>, version: &str) -> Result<Self, VersionError> {
        Ok(Self::new(id, parse_version(version)?))
    }
}

impl fmt::Display for VersionedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.id, self.version)
    }
}

impl FromStr for VersionedIdentifier {
    type Err = VersionError;

    /// Parses `id_version`; the id may itself contain underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, version) = s.rsplit_once('_')
            .ok_or_else(|| VersionError::InvalidFormat(s.to_string()))?;
        if id.is_empty() {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }
        Self::parse(id, version)
    }
}

fn serialize_version<S: Serializer>(version: &Version, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&version.to_string())
}

fn deserialize_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Version, D::Error> {
    let raw = String::deserialize(deserializer)?;
    // Full semver first so serialized identifiers round-trip exactly
    match Version::parse(&raw) {
        Ok(version) => Ok(version),
        Err(_) => parse_version(&raw).map_err(serde::de::Error::custom),
    }
}
