//! BeePy Virtual File System
//!
//! The loader never touches the interpreter's filesystem directly; it goes
//! through [`VirtualFileSystem`], which mirrors the small surface the
//! embedded runtime exposes (mkdir, write, read, existence checks).
//!
//! # Usage
//! ```rust
//! use beepy_vfs::{MemoryFileSystem, VirtualFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::new();
//! fs.mkdir(Path::new("app")).unwrap();
//! fs.write_file(Path::new("app/main.py"), b"print(1)").unwrap();
//! assert!(fs.is_dir(Path::new("app")));
//! assert_eq!(fs.read_file(Path::new("app/main.py")).unwrap(), b"print(1)");
//! ```

mod error;
mod memory;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use memory::{EntryKind, MemoryFileSystem, VfsEntry};
pub use r#trait::VirtualFileSystem;

/// Create a new memory-based file system.
pub fn memory_fs() -> MemoryFileSystem {
    MemoryFileSystem::new()
}
