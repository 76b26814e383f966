//! BeePy - browser-side loader for an embedded Python runtime
//!
//! Re-exports the loader crates and wires them together the way a page
//! does: one virtual filesystem, one gateway against the page origin, one
//! module loader, one bootstrapper.
//!
//! # Architecture
//!
//! ```text
//! beepy-config/  - configuration values and merge (no IO)
//! beepy-vfs/     - virtual filesystem trait and in-memory implementation
//! beepy-loader/  - resolver, gateway, loader, bootstrapper, dev reload
//! beepy-cli/     - command line driver over a local directory
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use beepy_workspace::{page, LoaderConfig, MemoryHttpClient, DryRunInterpreter, StaticEngineHost};
//!
//! let server = MemoryHttpClient::new().with_file("__init__.py", "print('hello')");
//! let host = Arc::new(StaticEngineHost::new(Arc::new(DryRunInterpreter::new())));
//! let mut boot = page(LoaderConfig::default(), host, Arc::new(server), "/index.html");
//! futures::executor::block_on(boot.load()).unwrap();
//! ```

use std::sync::Arc;

pub use beepy_config::{Component, ConfigError, ConfigValue, LoaderConfig, Requirements};
pub use beepy_loader::*;
pub use beepy_vfs::{MemoryFileSystem, VfsError, VirtualFileSystem};

/// Bootstrapper for a page at `page_path` served from `config.origin`
///
/// The page gets a fresh in-memory virtual filesystem. In development mode
/// `config.dev_extra_query` is appended to every request.
pub fn page(
    config: LoaderConfig,
    host: Arc<dyn EngineHost>,
    transport: Arc<dyn Transport>,
    page_path: &str,
) -> Bootstrapper {
    let vfs: Arc<dyn VirtualFileSystem> = Arc::new(MemoryFileSystem::new());
    page_with_vfs(config, host, transport, vfs, page_path)
}

/// Like [`page`], over an existing virtual filesystem
pub fn page_with_vfs(
    config: LoaderConfig,
    host: Arc<dyn EngineHost>,
    transport: Arc<dyn Transport>,
    vfs: Arc<dyn VirtualFileSystem>,
    page_path: &str,
) -> Bootstrapper {
    let mut gateway = FileGateway::new(transport, config.origin.clone(), ROOT_PACKAGE);
    if let Some(query) = config.request_query() {
        gateway = gateway.with_dev_extra_query(query);
    }
    let gateway = Arc::new(gateway);
    let loader = ModuleLoader::new(vfs, gateway, ROOT_PACKAGE).with_page_path(page_path);
    Bootstrapper::new(config, host, loader)
}
