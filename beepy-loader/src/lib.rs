//! BeePy Loader
//!
//! Bootstraps an embedded interpreter in the page and keeps application
//! source files in its virtual filesystem in sync with the server.
//!
//! # Layers
//!
//! - [`resolver`]: identifier -> directory/leaf, package directories
//! - [`gateway`]: fetch files and write them into the virtual root
//! - [`loader`]: package-then-leaf module lookup, reload cache
//! - [`bootstrap`]: the load sequence and entry point
//! - [`reload`]: dev file-watch channel
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use beepy_loader::{Bootstrapper, DryRunInterpreter, FileGateway, LoadState,
//!     MemoryHttpClient, ModuleLoader, StaticEngineHost, ROOT_PACKAGE};
//! use beepy_config::LoaderConfig;
//! use beepy_vfs::MemoryFileSystem;
//!
//! let server = MemoryHttpClient::new().with_file("__init__.py", "print('hi')");
//! let gateway = Arc::new(FileGateway::new(Arc::new(server), "http://localhost:8000", ROOT_PACKAGE));
//! let loader = ModuleLoader::new(Arc::new(MemoryFileSystem::new()), gateway, ROOT_PACKAGE);
//! let host = Arc::new(StaticEngineHost::new(Arc::new(DryRunInterpreter::new())));
//!
//! let mut boot = Bootstrapper::new(LoaderConfig::default(), host, loader);
//! futures::executor::block_on(boot.load()).unwrap();
//! assert_eq!(boot.state(), LoadState::Ready);
//! assert!(boot.loader().is_materialized("__init__.py"));
//! ```

pub mod bootstrap;
pub mod context;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod import_hook;
pub mod loader;
pub mod manifest;
pub mod module_id;
pub mod registry;
pub mod reload;
pub mod resolver;

pub use bootstrap::{Bootstrapper, EntryHook, LoadState, BUNDLE_PACKAGE, DEV_BUNDLE_WHEEL};
pub use context::LoadContext;
pub use engine::{
    DryRunInterpreter, EngineHost, Interpreter, InterpreterCall, StaticEngineHost,
};
pub use error::{
    BootError, BootResult, EngineError, GatewayError, LoadError, LoadResult, ReloadError,
    RuntimeError,
};
pub use gateway::{
    AsyncHttpClient, FileGateway, FileRecord, HttpClient, HttpResponse, LoadOptions,
    MemoryHttpClient, Method, Transport, TransportError,
};
pub use import_hook::ImportHook;
pub use loader::{
    looks_like_html, LoadModuleOptions, LoadedModule, ModuleLoader, ReloadCache,
    ReloadCacheEntry, WriteTarget,
};
pub use manifest::PackageManifest;
pub use module_id::{
    normalize_identifier, ModuleId, ParseError, FRAMEWORK_PACKAGE, PACKAGE_MARKER, ROOT_PACKAGE,
};
pub use registry::{ModuleRegistry, ReloadableUnit};
pub use reload::{
    ChannelState, DevReloadChannel, MessageStream, ReloadPlan, ReloadTransport, DEV_SERVER_URL,
    RELOAD_ALL,
};
pub use resolver::{PathResolver, ResolvedPath, Separator};
