use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;
use zip::ZipArchive;

use crate::content::error::ContentError;
use crate::kernel::constants::UNKNOWN_SIZE;

/// Where the bytes of a [`ContentReference`] come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backing {
    /// A file on the local filesystem
    Local(PathBuf),
    /// A remote resource, fetched through the content cache
    Remote(Url),
    /// An entry inside a jar, read through the jar's local file
    JarEntry { jar: Arc<ContentReference>, entry: String },
}

/// Uniform handle to a byte source.
///
/// The identifier is symbolic (typically the path of the content relative to its
/// feature or site) and is what verifiers and consumers key on. Exactly one
/// backing supplies the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReference {
    identifier: String,
    backing: Backing,
    length_hint: Option<u64>,
}

impl ContentReference {
    pub fn local(identifier: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { identifier: identifier.into(), backing: Backing::Local(path.into()), length_hint: None }
    }

    pub fn remote(identifier: impl Into<String>, url: Url) -> Self {
        Self { identifier: identifier.into(), backing: Backing::Remote(url), length_hint: None }
    }

    /// `file:` URLs become local references, everything else is remote.
    pub fn from_url(identifier: impl Into<String>, url: Url) -> Result<Self, ContentError> {
        let identifier = identifier.into();
        if url.scheme() == "file" {
            let path = url.to_file_path().map_err(|_| ContentError::InvalidLocation {
                location: url.to_string(),
                reason: "file URL has no local path".to_string(),
            })?;
            return Ok(Self::local(identifier, path));
        }
        Ok(Self::remote(identifier, url))
    }

    /// A reference to `entry` inside `jar`.
    pub fn jar_entry(jar: ContentReference, entry: impl Into<String>) -> Self {
        let entry = entry.into();
        Self {
            identifier: entry.clone(),
            backing: Backing::JarEntry { jar: Arc::new(jar), entry },
            length_hint: None,
        }
    }

    /// Declared length for remote content whose size is known up front.
    pub fn with_length_hint(mut self, length: u64) -> Self {
        self.length_hint = Some(length);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// True when the bytes can be read without any network access.
    pub fn is_local(&self) -> bool {
        match &self.backing {
            Backing::Local(_) => true,
            Backing::Remote(_) => false,
            Backing::JarEntry { jar, .. } => jar.is_local(),
        }
    }

    /// Relative path the content should be stored under: the jar entry name, or
    /// the identifier for plain files.
    pub fn entry_path(&self) -> &str {
        match &self.backing {
            Backing::JarEntry { entry, .. } => entry,
            _ => &self.identifier,
        }
    }

    /// Identity used by the content cache
    pub fn cache_key(&self) -> String {
        match &self.backing {
            Backing::Local(path) => path.display().to_string(),
            Backing::Remote(url) => url.to_string(),
            Backing::JarEntry { jar, entry } => format!("{}!/{}", jar.cache_key(), entry),
        }
    }

    /// The local file behind this reference.
    pub fn as_file(&self) -> Result<&Path, ContentError> {
        match &self.backing {
            Backing::Local(path) => Ok(path),
            _ => Err(ContentError::NotAFile { identifier: self.identifier.clone() }),
        }
    }

    /// The URL of this reference; jar entries use `jar:file:<path>!/<entry>`.
    pub fn as_url(&self) -> Result<Url, ContentError> {
        match &self.backing {
            Backing::Local(path) => Url::from_file_path(path).map_err(|_| ContentError::NotAUrl {
                identifier: self.identifier.clone(),
                reason: format!("'{}' is not an absolute path", path.display()),
            }),
            Backing::Remote(url) => Ok(url.clone()),
            Backing::JarEntry { jar, entry } => {
                let path = jar.as_file().map_err(|_| ContentError::NotAUrl {
                    identifier: self.identifier.clone(),
                    reason: format!("jar '{}' is not resolved to a local file", jar.identifier()),
                })?;
                Url::parse(&format!("jar:file:{}!/{}", path.display(), entry)).map_err(|e| ContentError::NotAUrl {
                    identifier: self.identifier.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Open the bytes. Remote content has to be resolved by the content cache first.
    pub fn input_stream(&self) -> Result<Box<dyn Read + Send>, ContentError> {
        match &self.backing {
            Backing::Local(path) => {
                let file = File::open(path).map_err(|e| ContentError::io(e, "open", path.display().to_string()))?;
                Ok(Box::new(file))
            }
            Backing::Remote(_) => Err(ContentError::NotResolved { identifier: self.identifier.clone() }),
            Backing::JarEntry { jar, entry } => {
                let path = jar.as_file().map_err(|_| ContentError::NotResolved { identifier: jar.identifier().to_string() })?;
                let mut archive = open_archive(path)?;
                let mut file = archive.by_name(entry).map_err(|e| entry_error(path, entry, e))?;
                let mut buffer = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
                file.read_to_end(&mut buffer)
                    .map_err(|e| ContentError::io(e, "read_entry", format!("{}!/{}", path.display(), entry)))?;
                Ok(Box::new(Cursor::new(buffer)))
            }
        }
    }

    /// Length in bytes, or [`UNKNOWN_SIZE`] when it cannot be determined locally.
    pub fn input_size(&self) -> i64 {
        let size = match &self.backing {
            Backing::Local(path) => std::fs::metadata(path).ok().map(|m| m.len()),
            Backing::Remote(_) => self.length_hint,
            Backing::JarEntry { jar, entry } => jar.as_file().ok()
                .and_then(|path| open_archive(path).ok())
                .and_then(|mut archive| archive.by_name(entry).ok().map(|f| f.size())),
        };
        size.and_then(|s| i64::try_from(s).ok()).unwrap_or(UNKNOWN_SIZE)
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, ContentError> {
    let file = File::open(path).map_err(|e| ContentError::io(e, "open_archive", path.display().to_string()))?;
    ZipArchive::new(file).map_err(|source| ContentError::Archive { archive: path.to_path_buf(), source })
}

fn entry_error(path: &Path, entry: &str, error: zip::result::ZipError) -> ContentError {
    match error {
        zip::result::ZipError::FileNotFound => ContentError::MissingEntry {
            archive: path.to_path_buf(),
            entry: entry.to_string(),
        },
        source => ContentError::Archive { archive: path.to_path_buf(), source },
    }
}

/// References to every file entry of a locally resolved jar, in archive order.
pub fn jar_entries(jar: &ContentReference) -> Result<Vec<ContentReference>, ContentError> {
    let path = jar.as_file()?;
    let mut archive = open_archive(path)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let file = archive.by_index(index)
            .map_err(|source| ContentError::Archive { archive: path.to_path_buf(), source })?;
        if file.is_dir() || file.enclosed_name().is_none() {
            continue;
        }
        entries.push(ContentReference::jar_entry(jar.clone(), file.name()));
    }
    Ok(entries)
}
