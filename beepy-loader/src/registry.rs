//! Module registry
//!
//! Tracks the modules the loader has imported so they can be reloaded by
//! name, independently of the interpreter's own module cache.

use std::collections::BTreeMap;
use std::sync::RwLock;

use beepy_config::Component;
use serde::Serialize;
use tracing::info;

use crate::engine::Interpreter;
use crate::error::RuntimeError;

const TARGET: &str = Component::Reload.target();

/// A module that can be re-executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadableUnit {
    /// Dotted import name
    pub module: String,
    /// File backing the module, relative to the virtual root
    pub virtual_path: Option<String>,
    /// Times the module was reloaded
    pub generation: u32,
}

/// Registry of imported modules
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    units: RwLock<BTreeMap<String, ReloadableUnit>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an imported module
    ///
    /// Registering again updates the path and keeps the generation.
    pub fn register(&self, module: &str, virtual_path: Option<String>) {
        if let Ok(mut units) = self.units.write() {
            units
                .entry(module.to_string())
                .and_modify(|unit| {
                    if virtual_path.is_some() {
                        unit.virtual_path = virtual_path.clone();
                    }
                })
                .or_insert_with(|| ReloadableUnit {
                    module: module.to_string(),
                    virtual_path,
                    generation: 0,
                });
        }
    }

    pub fn get(&self, module: &str) -> Option<ReloadableUnit> {
        self.units.read().ok().and_then(|u| u.get(module).cloned())
    }

    pub fn contains(&self, module: &str) -> bool {
        self.get(module).is_some()
    }

    /// Registered modules, sorted by name
    pub fn modules(&self) -> Vec<ReloadableUnit> {
        self.units
            .read()
            .map(|u| u.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.units.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reload `module` in the interpreter and bump its generation
    ///
    /// Unregistered modules are registered on the fly.
    pub async fn reload(
        &self,
        interpreter: &dyn Interpreter,
        module: &str,
    ) -> Result<u32, RuntimeError> {
        interpreter.reload_module(module).await?;

        let mut units = self
            .units
            .write()
            .map_err(|_| RuntimeError::new("module registry poisoned"))?;
        let unit = units
            .entry(module.to_string())
            .or_insert_with(|| ReloadableUnit {
                module: module.to_string(),
                virtual_path: None,
                generation: 0,
            });
        unit.generation += 1;
        info!(target: TARGET, module, generation = unit.generation, "module reloaded");
        Ok(unit.generation)
    }
}
