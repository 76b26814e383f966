//! Loader error types

use crate::bootstrap::LoadState;
use crate::module_id::ParseError;
use beepy_vfs::VfsError;

/// File gateway errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("file not found: {url} (HTTP {status})")]
    NotFound { url: String, status: u16 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

/// Module loader errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("module '{module}' not found, tried: {}", .tried.join(", "))]
    ModuleNotFound { module: String, tried: Vec<String> },

    #[error("invalid module identifier: {0}")]
    InvalidIdentifier(#[from] ParseError),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Error reported by the interpreter runtime
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The engine never became ready
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("interpreter engine failed to start: {message}")]
pub struct EngineError {
    pub message: String,
}

/// Dev reload channel errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReloadError {
    #[error("dev reload server unavailable at {url}: {message}")]
    Unavailable { url: String, message: String },
}

/// Bootstrap errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    EngineInit(#[from] EngineError),

    #[error("failed to install '{package}': {source}")]
    Install {
        package: String,
        #[source]
        source: RuntimeError,
    },

    #[error("entry module '{module}' could not be loaded: {source}")]
    EntryPoint {
        module: String,
        #[source]
        source: LoadError,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error("invalid load state transition: {current:?} -> {next:?}")]
    InvalidTransition { current: LoadState, next: LoadState },

    #[error("interpreter runtime is not ready")]
    RuntimeNotReady,
}

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for bootstrap operations
pub type BootResult<T> = Result<T, BootError>;
