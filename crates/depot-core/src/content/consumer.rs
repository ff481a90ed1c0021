use std::fmt::Debug;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::content::error::ContentError;
use crate::content::reference::ContentReference;
use crate::kernel::constants::{ARCHIVE_EXTENSION, DATA_DIR, FEATURES_DIR, PLUGINS_DIR, STAGING_DIR};
use crate::kernel::error::Result;
use crate::model::{FeatureReference, NonPluginEntry, PluginEntry, VersionedIdentifier};
use crate::storage::{LocalStorageProvider, StorageProvider};

/// Sink for one feature's content during an install transaction.
///
/// Nothing becomes visible in the target until [`close`](Self::close) commits.
/// After `close` or [`abort`](Self::abort) the consumer refuses further calls.
pub trait FeatureContentConsumer: Send + Debug {
    /// Store one file of the feature itself.
    fn store(&mut self, reference: &ContentReference) -> Result<()>;

    /// Open a consumer for one plugin. It must be closed before this consumer commits.
    fn open_plugin(&mut self, entry: &PluginEntry) -> Result<Box<dyn ContentConsumer>>;

    /// Open a consumer for one piece of non-plugin data.
    fn open_non_plugin(&mut self, entry: &NonPluginEntry) -> Result<Box<dyn ContentConsumer>>;

    /// Commit everything stored and return the installed feature.
    fn close(&mut self) -> Result<FeatureReference>;

    /// Discard everything stored so far.
    fn abort(&mut self) -> Result<()>;
}

/// Sink for the content of a single plugin or non-plugin entry.
pub trait ContentConsumer: Send + Debug {
    fn store(&mut self, reference: &ContentReference) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Consumer installing into a site directory.
///
/// Content is staged under `<site>/.staging/<uuid>` and renamed into
/// `features/`, `plugins/` and `data/` on commit. Plugins and data already
/// present in the site are kept; an installed feature directory is a conflict.
#[derive(Debug)]
pub struct SiteFileConsumer {
    feature: VersionedIdentifier,
    storage: LocalStorageProvider,
    staging: PathBuf,
    open: Arc<AtomicUsize>,
    finished: bool,
}

impl SiteFileConsumer {
    pub fn new(site_root: &Path, feature: VersionedIdentifier) -> Result<Self> {
        let storage = LocalStorageProvider::new(site_root.to_path_buf());
        let staging = Path::new(STAGING_DIR).join(uuid::Uuid::new_v4().to_string());
        storage.create_dir_all(&staging)?;
        log::debug!("Staging {} in {}", feature, storage.resolve(&staging).display());
        Ok(Self {
            feature,
            storage,
            staging,
            open: Arc::new(AtomicUsize::new(0)),
            finished: false,
        })
    }

    /// Absolute staging directory of this transaction
    pub fn staging_dir(&self) -> PathBuf {
        self.storage.resolve(&self.staging)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            return Err(ContentError::ConsumerClosed { feature: self.feature.to_string() }.into());
        }
        Ok(())
    }

    fn feature_dir(&self) -> PathBuf {
        Path::new(FEATURES_DIR).join(self.feature.to_string())
    }

    fn entry_consumer(&self, root: PathBuf, layout: Layout) -> Box<dyn ContentConsumer> {
        self.open.fetch_add(1, Ordering::SeqCst);
        Box::new(EntryConsumer {
            storage: self.storage.clone(),
            root,
            layout,
            open: self.open.clone(),
            closed: false,
        })
    }

    /// Every staged top-level item paired with its place in the site.
    fn planned_moves(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut moves = Vec::new();
        for dir in [FEATURES_DIR, PLUGINS_DIR, DATA_DIR] {
            let staged_dir = self.staging.join(dir);
            if !self.storage.is_dir(&staged_dir) {
                continue;
            }
            for staged in self.storage.read_dir(&staged_dir)? {
                let Some(name) = staged.file_name() else { continue };
                let target = Path::new(dir).join(name);
                if self.storage.exists(&target) {
                    if dir == FEATURES_DIR {
                        return Err(ContentError::AlreadyInstalled {
                            feature: self.feature.to_string(),
                            path: self.storage.resolve(&target),
                        }.into());
                    }
                    log::debug!("{} already present, keeping the installed copy", target.display());
                    continue;
                }
                moves.push((staged, target));
            }
        }
        Ok(moves)
    }

    fn commit(&self) -> Result<()> {
        let moves = self.planned_moves()?;
        let mut done: Vec<&(PathBuf, PathBuf)> = Vec::with_capacity(moves.len());
        for planned in &moves {
            let (from, to) = planned;
            let moved = to.parent()
                .map_or(Ok(()), |parent| self.storage.create_dir_all(parent))
                .and_then(|_| self.storage.rename(from, to));
            if let Err(e) = moved {
                log::warn!("Commit of {} failed at {}, rolling back {} move(s)", self.feature, to.display(), done.len());
                for (from, to) in done.iter().rev() {
                    if let Err(undo) = self.storage.rename(to, from) {
                        log::warn!("Could not roll back {}: {}", to.display(), undo);
                    }
                }
                return Err(e);
            }
            done.push(planned);
        }
        log::info!("Committed {} ({} item(s))", self.feature, moves.len());
        Ok(())
    }

    fn discard_staging(&self) -> Result<()> {
        if self.storage.exists(&self.staging) {
            self.storage.remove_dir_all(&self.staging)?;
        }
        Ok(())
    }
}

impl FeatureContentConsumer for SiteFileConsumer {
    fn store(&mut self, reference: &ContentReference) -> Result<()> {
        self.ensure_open()?;
        let target = self.staging.join(self.feature_dir()).join(safe_relative(reference.entry_path())?);
        copy_into(&self.storage, reference, &target)
    }

    fn open_plugin(&mut self, entry: &PluginEntry) -> Result<Box<dyn ContentConsumer>> {
        self.ensure_open()?;
        let plugins = self.staging.join(PLUGINS_DIR);
        let layout = if entry.unpack {
            Layout::Tree
        } else {
            Layout::Archive(format!("{}.{}", entry.identifier, ARCHIVE_EXTENSION))
        };
        let root = if entry.unpack { plugins.join(entry.identifier.to_string()) } else { plugins };
        Ok(self.entry_consumer(root, layout))
    }

    fn open_non_plugin(&mut self, _entry: &NonPluginEntry) -> Result<Box<dyn ContentConsumer>> {
        self.ensure_open()?;
        let root = self.staging.join(DATA_DIR).join(self.feature.to_string());
        Ok(self.entry_consumer(root, Layout::Flat))
    }

    fn close(&mut self) -> Result<FeatureReference> {
        self.ensure_open()?;
        let open = self.open.load(Ordering::SeqCst);
        if open > 0 {
            return Err(ContentError::OpenSubConsumers { feature: self.feature.to_string(), open }.into());
        }
        self.commit()?;
        self.finished = true;
        self.discard_staging()?;
        Ok(FeatureReference {
            identifier: self.feature.clone(),
            location: self.storage.resolve(&self.feature_dir()),
        })
    }

    fn abort(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        log::info!("Aborting install of {}", self.feature);
        self.discard_staging()
    }
}

impl Drop for SiteFileConsumer {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.discard_staging() {
                log::warn!("Could not remove staging for {}: {}", self.feature, e);
            }
        }
    }
}

/// Where an entry consumer puts stored references
#[derive(Debug)]
enum Layout {
    /// The single archive of a packed plugin, under this name
    Archive(String),
    /// Each reference at its entry path
    Tree,
    /// Each reference at its file name
    Flat,
}

#[derive(Debug)]
struct EntryConsumer {
    storage: LocalStorageProvider,
    root: PathBuf,
    layout: Layout,
    open: Arc<AtomicUsize>,
    closed: bool,
}

impl ContentConsumer for EntryConsumer {
    fn store(&mut self, reference: &ContentReference) -> Result<()> {
        if self.closed {
            return Err(ContentError::ConsumerClosed { feature: self.root.display().to_string() }.into());
        }
        let relative = match &self.layout {
            Layout::Archive(name) => PathBuf::from(name),
            Layout::Tree => safe_relative(reference.entry_path())?,
            Layout::Flat => {
                let path = safe_relative(reference.entry_path())?;
                path.file_name().map(PathBuf::from).unwrap_or(path)
            }
        };
        copy_into(&self.storage, reference, &self.root.join(relative))
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// `path` as a relative path that cannot leave the directory it is joined to.
fn safe_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let mut safe = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => safe.push(part),
            Component::CurDir => {}
            _ => return Err(ContentError::UnsafeEntryPath { path: path.to_string() }.into()),
        }
    }
    if safe.as_os_str().is_empty() {
        return Err(ContentError::UnsafeEntryPath { path: path.to_string() }.into());
    }
    Ok(safe)
}

fn copy_into(storage: &LocalStorageProvider, reference: &ContentReference, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        storage.create_dir_all(parent)?;
    }
    let mut input = reference.input_stream()?;
    let mut output = storage.open_write(target)?;
    let copied = io::copy(&mut input, &mut output)
        .map_err(|e| ContentError::io(e, "store", storage.resolve(target).display().to_string()))?;
    log::debug!("Stored {} ({} bytes)", reference.identifier(), copied);
    Ok(())
}
