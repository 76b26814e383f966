//! Interpreter runtime seam
//!
//! The loader drives an embedded interpreter it does not own. The engine
//! host injects the engine script and hands out the runtime once it is
//! ready; the runtime installs packages and imports modules.

mod dry_run;

pub use dry_run::{CallObserver, DryRunInterpreter, InterpreterCall, StaticEngineHost};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, RuntimeError};

/// System package that provides the package installer
pub const INSTALLER_PACKAGE: &str = "micropip";

/// File name of the engine script under the engine index URL
pub const ENGINE_SCRIPT: &str = "pyodide.js";

/// Code that bridges page globals into the interpreter
pub const GLOBALS_BRIDGE: &str =
    "from beepy.utils.internal import _init_js, _BeePyGlobals\n_init_js()\n_BeePyGlobals(globals())\n";

/// Embedded interpreter runtime
#[async_trait(?Send)]
pub trait Interpreter {
    /// Engine version string
    fn version(&self) -> String;

    /// Evaluate code in the global scope
    fn run(&self, code: &str) -> Result<(), RuntimeError>;

    /// Load a package shipped with the engine
    async fn load_system_package(&self, name: &str) -> Result<(), RuntimeError>;

    /// Install a package through the package installer
    async fn install(&self, requirement: &str) -> Result<(), RuntimeError>;

    /// Import a module by dotted name
    fn import_module(&self, module: &str) -> Result<(), RuntimeError>;

    /// Re-execute an already imported module
    async fn reload_module(&self, module: &str) -> Result<(), RuntimeError>;
}

/// Host environment that loads the engine
#[async_trait(?Send)]
pub trait EngineHost {
    /// Add the engine script to the page
    fn inject_script(&self, src: &str);

    /// Wait until the engine is ready and return its runtime
    async fn ready(&self) -> Result<Arc<dyn Interpreter>, EngineError>;
}
