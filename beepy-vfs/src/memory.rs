//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::VirtualFileSystem;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

/// Kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// A single entry in a filesystem snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct VfsEntry {
    /// Normalized path (no leading or trailing `/`)
    pub path: String,
    /// File or directory
    pub kind: EntryKind,
    /// File content (empty for directories)
    pub content: Vec<u8>,
}

/// An in-memory file system implementation.
///
/// Directories are tracked explicitly, so writes into a directory that was
/// never created fail the same way they do in the runtime's filesystem.
/// The root (empty path) always exists.
///
/// # Example
/// ```
/// use beepy_vfs::{MemoryFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// assert!(fs.write_file(Path::new("pkg/a.py"), b"").is_err());
/// fs.mkdir(Path::new("pkg")).unwrap();
/// fs.write_file(Path::new("pkg/a.py"), b"x = 1").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    nodes: Arc<RwLock<BTreeMap<String, Node>>>,
}

impl MemoryFileSystem {
    /// Create a new empty memory file system.
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Create a new memory file system pre-populated with files.
    ///
    /// Parent directories are created as needed.
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let fs = Self::new();
        {
            let mut nodes = fs.nodes.write().unwrap_or_else(|e| e.into_inner());
            for (path, content) in files {
                let normalized = normalize(path.as_ref());
                let mut prefix = String::new();
                for part in parent_of(&normalized).split('/').filter(|p| !p.is_empty()) {
                    if !prefix.is_empty() {
                        prefix.push('/');
                    }
                    prefix.push_str(part);
                    nodes.entry(prefix.clone()).or_insert(Node::Dir);
                }
                nodes.insert(normalized, Node::File(content));
            }
        }
        fs
    }

    /// All entries, sorted by path
    pub fn snapshot(&self) -> Vec<VfsEntry> {
        let nodes = match self.nodes.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };
        nodes
            .iter()
            .map(|(path, node)| match node {
                Node::File(content) => VfsEntry {
                    path: path.clone(),
                    kind: EntryKind::File,
                    content: content.clone(),
                },
                Node::Dir => VfsEntry {
                    path: path.clone(),
                    kind: EntryKind::Dir,
                    content: Vec::new(),
                },
            })
            .collect()
    }

    fn lock_poisoned() -> VfsError {
        VfsError::Io {
            message: String::from("Lock poisoned"),
        }
    }

    fn node_kind(&self, path: &Path) -> Option<EntryKind> {
        let normalized = normalize(&path.to_string_lossy());
        if normalized.is_empty() {
            return Some(EntryKind::Dir);
        }
        let nodes = self.nodes.read().ok()?;
        nodes.get(&normalized).map(|node| match node {
            Node::File(_) => EntryKind::File,
            Node::Dir => EntryKind::Dir,
        })
    }

    fn check_parent(nodes: &BTreeMap<String, Node>, normalized: &str) -> VfsResult<()> {
        let parent = parent_of(normalized);
        if parent.is_empty() {
            return Ok(());
        }
        match nodes.get(parent) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(VfsError::NotADirectory {
                path: parent.to_string(),
            }),
            None => Err(VfsError::NotFound {
                path: parent.to_string(),
            }),
        }
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Use forward slashes and drop leading/trailing separators.
fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}

fn parent_of(normalized: &str) -> &str {
    match normalized.rfind('/') {
        Some(idx) => &normalized[..idx],
        None => "",
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let normalized = normalize(&path.to_string_lossy());
        let nodes = self.nodes.read().map_err(|_| Self::lock_poisoned())?;

        match nodes.get(&normalized) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir) => Err(VfsError::IsADirectory { path: normalized }),
            None if normalized.is_empty() => Err(VfsError::IsADirectory { path: normalized }),
            None => Err(VfsError::NotFound { path: normalized }),
        }
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let normalized = normalize(&path.to_string_lossy());
        if normalized.is_empty() {
            return Err(VfsError::IsADirectory { path: normalized });
        }
        let mut nodes = self.nodes.write().map_err(|_| Self::lock_poisoned())?;
        Self::check_parent(&nodes, &normalized)?;
        if let Some(Node::Dir) = nodes.get(&normalized) {
            return Err(VfsError::IsADirectory { path: normalized });
        }
        nodes.insert(normalized, Node::File(content.to_vec()));
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(&path.to_string_lossy());
        if normalized.is_empty() {
            return Err(VfsError::AlreadyExists { path: normalized });
        }
        let mut nodes = self.nodes.write().map_err(|_| Self::lock_poisoned())?;
        if nodes.contains_key(&normalized) {
            return Err(VfsError::AlreadyExists { path: normalized });
        }
        Self::check_parent(&nodes, &normalized)?;
        nodes.insert(normalized, Node::Dir);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.node_kind(path).is_some()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.node_kind(path) == Some(EntryKind::File)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.node_kind(path) == Some(EntryKind::Dir)
    }
}
