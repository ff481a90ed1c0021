use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::Mutex;
use url::Url;

use crate::connection::manager::ConnectionManager;
use crate::connection::request::{ConnectionRequest, ConnectionStatus};
use crate::content::error::ContentError;
use crate::content::reference::{Backing, ContentReference};
use crate::kernel::constants::DEFAULT_CACHE_PREFIX;
use crate::kernel::error::{Error, Result};
use crate::monitor::ProgressMonitor;

/// How often a waiting download re-checks its monitor for cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
enum CacheRoot {
    /// Removed when the cache is dropped
    Temporary(TempDir),
    /// Configured staging root, left in place
    Fixed(PathBuf),
}

impl CacheRoot {
    fn path(&self) -> &Path {
        match self {
            CacheRoot::Temporary(dir) => dir.path(),
            CacheRoot::Fixed(path) => path,
        }
    }
}

/// Local copies of remote content, shared by every install of an application.
///
/// Each remote key is downloaded at most once. The whole check, download and
/// record sequence runs under one lock, so a concurrent resolution of the same
/// key waits for the first and reuses its file.
#[derive(Debug)]
pub struct ContentCache {
    root: CacheRoot,
    entries: Mutex<HashMap<String, PathBuf>>,
    connections: Arc<ConnectionManager>,
    fetches: AtomicUsize,
}

impl ContentCache {
    /// A cache in a fresh temporary directory.
    pub fn new(connections: Arc<ConnectionManager>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("depot-cache-")
            .tempdir()
            .map_err(|e| Error::io(e, "create_cache_root", std::env::temp_dir()))?;
        log::debug!("Content cache at {}", dir.path().display());
        Ok(Self::with(CacheRoot::Temporary(dir), connections))
    }

    /// A cache rooted at `root`, created if missing.
    pub fn with_root(root: impl Into<PathBuf>, connections: Arc<ConnectionManager>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| Error::io(e, "create_cache_root", root.clone()))?;
        Ok(Self::with(CacheRoot::Fixed(root), connections))
    }

    fn with(root: CacheRoot, connections: Arc<ConnectionManager>) -> Self {
        Self {
            root,
            entries: Mutex::new(HashMap::new()),
            connections,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// A local equivalent of `reference`, downloading it on first use.
    pub async fn resolve(&self, reference: &ContentReference, monitor: &dyn ProgressMonitor) -> Result<ContentReference> {
        if reference.is_local() {
            return Ok(reference.clone());
        }
        match reference.backing() {
            Backing::Remote(url) => self.fetch(reference, url, monitor).await,
            Backing::JarEntry { jar, entry } => {
                let url = match jar.backing() {
                    Backing::Remote(url) => url,
                    _ => return Err(ContentError::NotResolved { identifier: jar.identifier().to_string() }.into()),
                };
                let local_jar = self.fetch(jar, url, monitor).await?;
                Ok(ContentReference::jar_entry(local_jar, entry.clone()))
            }
            Backing::Local(_) => Ok(reference.clone()),
        }
    }

    /// Resolve `reference` and open its bytes.
    pub async fn open_stream(
        &self,
        reference: &ContentReference,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Box<dyn Read + Send>> {
        let local = self.resolve(reference, monitor).await?;
        Ok(local.input_stream()?)
    }

    /// Number of downloads that completed and were recorded
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn fetch(&self, reference: &ContentReference, url: &Url, monitor: &dyn ProgressMonitor) -> Result<ContentReference> {
        let key = reference.cache_key();
        let mut entries = self.entries.lock().await;

        if let Some(path) = entries.get(&key) {
            if path.is_file() {
                log::debug!("Cache hit for {}", key);
                return Ok(local_copy(reference, path));
            }
            // Removed behind our back, fetch again
            entries.remove(&key);
        }

        let destination = self.unique_path(url.path());
        log::info!("Downloading {} to {}", url, destination.display());
        let request = self.connections.open_connection(url.clone(), destination.clone(), None).await?;

        match wait_for(&request, monitor).await {
            ConnectionStatus::Ok => {
                entries.insert(key, destination.clone());
                self.fetches.fetch_add(1, Ordering::SeqCst);
                Ok(local_copy(reference, &destination))
            }
            ConnectionStatus::Canceled => {
                discard(&destination);
                Err(ContentError::Canceled { url: url.to_string() }.into())
            }
            status => {
                discard(&destination);
                let source = request.take_error()
                    .unwrap_or_else(|| io::Error::other(format!("request ended in state {}", status)));
                Err(ContentError::Download { url: url.to_string(), source }.into())
            }
        }
    }

    fn unique_path(&self, remote_path: &str) -> PathBuf {
        let name = local_random_identifier(remote_path, chrono::Utc::now().timestamp_millis());
        let mut candidate = self.root().join(&name);
        let mut counter = 1;
        while candidate.exists() {
            candidate = self.root().join(format!("{}_{}", counter, name));
            counter += 1;
        }
        candidate
    }
}

/// Local file name for a download: `<stem><millis><ext>`.
///
/// The extension is kept only when no path separator follows the last dot.
/// A path without a file name falls back to [`DEFAULT_CACHE_PREFIX`].
pub fn local_random_identifier(remote_path: &str, millis: i64) -> String {
    let name_start = remote_path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let name = &remote_path[name_start..];
    let (stem, extension) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot..]),
        None => (name, ""),
    };
    let stem = if stem.is_empty() { DEFAULT_CACHE_PREFIX } else { stem };
    format!("{}{}{}", stem, millis, extension)
}

async fn wait_for(request: &ConnectionRequest, monitor: &dyn ProgressMonitor) -> ConnectionStatus {
    let settled = request.wait();
    tokio::pin!(settled);
    loop {
        tokio::select! {
            status = &mut settled => return status,
            _ = tokio::time::sleep(CANCEL_POLL_INTERVAL) => {
                if monitor.is_canceled() && request.cancel() {
                    log::info!("Download of {} canceled", request.url());
                }
            }
        }
    }
}

fn local_copy(reference: &ContentReference, path: &Path) -> ContentReference {
    ContentReference::local(reference.identifier(), path)
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove partial download {}: {}", path.display(), e);
        }
    }
}
