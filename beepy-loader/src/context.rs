//! Per-operation load cursor

use crate::module_id::{lstrip, SOURCE_EXT};

/// Load context threaded through resolution and fetch calls
///
/// Records the most recently fetched file, which is the base for
/// relative module lookups, and the module currently being entered.
/// While a module is being entered, relative lookups are disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadContext {
    last_loaded_file: String,
    entering_module: Option<String>,
}

impl LoadContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose cursor starts at `path`
    pub fn at(path: &str) -> Self {
        let mut ctx = Self::new();
        ctx.record_load(path);
        ctx
    }

    pub fn last_loaded_file(&self) -> &str {
        &self.last_loaded_file
    }

    /// Record a fetched path, leading slashes stripped
    pub fn record_load(&mut self, path: &str) {
        self.last_loaded_file = lstrip(path).to_string();
    }

    /// Move the cursor back to a previously saved position
    pub fn restore(&mut self, saved: String) {
        self.last_loaded_file = saved;
    }

    /// Clear the cursor
    pub fn reset(&mut self) {
        self.last_loaded_file.clear();
    }

    pub fn enter(&mut self, module: &str) {
        self.entering_module = Some(module.to_string());
    }

    pub fn leave(&mut self) {
        self.entering_module = None;
    }

    pub fn entering_module(&self) -> Option<&str> {
        self.entering_module.as_deref()
    }

    /// Directory of the last loaded file
    ///
    /// The final segment is dropped when it is a source file. Empty while
    /// a module is being entered.
    pub fn current_dir(&self) -> &str {
        if self.entering_module.is_some() {
            return "";
        }

        let trimmed = self.last_loaded_file.trim_end_matches('/');
        let dir = match trimmed.rsplit_once('/') {
            Some((dir, file)) if is_source_file(file) => dir,
            None if is_source_file(trimmed) => "",
            _ => trimmed,
        };
        dir.trim_end_matches('/')
    }

    /// Prefix `path` with the current directory
    pub fn populate_current_path(&self, path: &str) -> String {
        let path = lstrip(path);
        let dir = self.current_dir();
        match (dir.is_empty(), path.is_empty()) {
            (true, _) => path.to_string(),
            (false, true) => dir.to_string(),
            (false, false) => format!("{}/{}", dir, path),
        }
    }
}

fn is_source_file(segment: &str) -> bool {
    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext == SOURCE_EXT)
        .unwrap_or(false)
}
