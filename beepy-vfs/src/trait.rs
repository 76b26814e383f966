//! VirtualFileSystem trait definition

use crate::error::VfsResult;
use std::path::Path;

/// Virtual File System trait
///
/// Provides the filesystem surface of the embedded runtime. Paths are
/// relative to the runtime's working directory and always use `/`.
///
/// # Implementations
/// - `MemoryFileSystem`: In-memory file system
pub trait VirtualFileSystem: Send + Sync {
    /// Read file contents
    ///
    /// # Returns
    /// File contents as bytes, or `NotFound` / `IsADirectory`
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// Write file contents
    ///
    /// Creates the file if it doesn't exist, truncates it if it does.
    /// The parent directory must already exist.
    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()>;

    /// Create a single directory
    ///
    /// Fails with `AlreadyExists` if the path exists and with `NotFound`
    /// if the parent directory is missing.
    fn mkdir(&self, path: &Path) -> VfsResult<()>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a file
    fn is_file(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;
}
