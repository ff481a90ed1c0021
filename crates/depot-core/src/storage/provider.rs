use std::fmt::Debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use crate::kernel::error::Result;

/// Trait for storage providers that can read and write data.
///
/// Paths are relative to the provider's base path.
pub trait StorageProvider: Send + Sync + Debug {
    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Absolute location of a relative path
    fn resolve(&self, path: &Path) -> PathBuf;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory and all its parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read a file to a string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write a string to a file, atomically replacing any previous content
    fn write_string(&self, path: &Path, contents: &str) -> Result<()>;

    /// Write bytes to a file, atomically replacing any previous content
    fn write_bytes(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Move a file or directory from one path to another
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove a file
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and all its contents
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open a file for writing, truncating it
    fn open_write(&self, path: &Path) -> Result<Box<dyn Write + Send>>;
}
