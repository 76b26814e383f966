//! Import hook for the interpreter's module finder
//!
//! When the interpreter cannot find a module locally it asks the hook,
//! which tries to fetch it from the server next to the importing file.
//! Names that failed once are remembered and never fetched again.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use beepy_config::Component;
use tracing::debug;

use crate::context::LoadContext;
use crate::loader::{LoadModuleOptions, LoadedModule, ModuleLoader};
use crate::module_id::FRAMEWORK_PACKAGE;

const TARGET: &str = Component::Loader.target();

pub struct ImportHook {
    loader: Arc<ModuleLoader>,
    missing: RwLock<HashSet<String>>,
    framework_path: String,
}

impl ImportHook {
    /// Hook loading framework submodules from `framework_path`
    pub fn new(loader: Arc<ModuleLoader>, framework_path: impl Into<String>) -> Self {
        Self {
            loader,
            missing: RwLock::new(HashSet::new()),
            framework_path: framework_path.into(),
        }
    }

    /// Names that are known not to be on the server
    pub fn with_known_missing<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut missing) = self.missing.write() {
            missing.extend(names.into_iter().map(Into::into));
        }
        self
    }

    pub fn is_missing(&self, fullname: &str) -> bool {
        self.missing
            .read()
            .map(|m| m.contains(fullname))
            .unwrap_or(false)
    }

    /// Try to materialize `fullname`
    ///
    /// Framework submodules resolve against the framework path and leave
    /// the cursor untouched. A failed lookup also leaves the cursor
    /// untouched.
    pub fn find_module(&self, ctx: &mut LoadContext, fullname: &str) -> Option<LoadedModule> {
        if self.is_missing(fullname) {
            return None;
        }

        let framework = fullname
            .strip_prefix(FRAMEWORK_PACKAGE)
            .is_some_and(|rest| rest.starts_with('.'));
        let saved = ctx.last_loaded_file().to_string();
        if framework {
            ctx.record_load(&self.framework_path);
        }

        let result = self
            .loader
            .load_module(ctx, fullname, LoadModuleOptions::default());
        if framework || result.is_err() {
            ctx.restore(saved);
        }

        match result {
            Ok(loaded) => Some(loaded),
            Err(err) => {
                debug!(target: TARGET, module = fullname, error = %err, "not on server");
                if let Ok(mut missing) = self.missing.write() {
                    missing.insert(fullname.to_string());
                }
                None
            }
        }
    }
}
