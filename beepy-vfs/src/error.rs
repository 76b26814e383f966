//! VFS Error Types

/// Result type for VFS operations
pub type VfsResult<T> = Result<T, VfsError>;

/// Error type for VFS operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VfsError {
    /// File or directory not found
    #[error("Path not found: {path}")]
    NotFound { path: String },

    /// Path already exists
    #[error("Path already exists: {path}")]
    AlreadyExists { path: String },

    /// A path component is a file where a directory is required
    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    /// A file operation targeted a directory
    #[error("Is a directory: {path}")]
    IsADirectory { path: String },

    /// Invalid path
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Backend failure
    #[error("IO error: {message}")]
    Io { message: String },
}
