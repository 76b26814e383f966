//! Recording engine used by the CLI and tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use beepy_config::Component;
use serde::Serialize;
use tracing::trace;

use super::{EngineHost, Interpreter};
use crate::error::{EngineError, RuntimeError};

const TARGET: &str = Component::Bootstrap.target();

/// A call made on the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", content = "arg", rename_all = "snake_case")]
pub enum InterpreterCall {
    Run(String),
    LoadSystemPackage(String),
    Install(String),
    Import(String),
    Reload(String),
}

/// Hook invoked before each call is answered
pub type CallObserver = Box<dyn Fn(&InterpreterCall)>;

/// Interpreter that records calls instead of executing them
///
/// Individual installs and imports can be made to fail.
#[derive(Default)]
pub struct DryRunInterpreter {
    calls: Mutex<Vec<InterpreterCall>>,
    failing: Mutex<HashSet<String>>,
    observer: Option<CallObserver>,
}

impl DryRunInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make installs, imports and reloads of `name` fail
    pub fn failing(self, name: &str) -> Self {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(name.to_string());
        }
        self
    }

    /// Observe every call as it happens
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&InterpreterCall) + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Recorded calls, in order
    pub fn calls(&self) -> Vec<InterpreterCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: InterpreterCall, name: &str) -> Result<(), RuntimeError> {
        trace!(target: TARGET, ?call, "interpreter call");
        if let Some(observer) = &self.observer {
            observer(&call);
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        let fails = self
            .failing
            .lock()
            .map(|f| f.contains(name))
            .unwrap_or(false);
        if fails {
            return Err(RuntimeError::new(format!("{} failed", name)));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Interpreter for DryRunInterpreter {
    fn version(&self) -> String {
        "dry-run".to_string()
    }

    fn run(&self, code: &str) -> Result<(), RuntimeError> {
        self.record(InterpreterCall::Run(code.to_string()), code)
    }

    async fn load_system_package(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(InterpreterCall::LoadSystemPackage(name.to_string()), name)
    }

    async fn install(&self, requirement: &str) -> Result<(), RuntimeError> {
        self.record(InterpreterCall::Install(requirement.to_string()), requirement)
    }

    fn import_module(&self, module: &str) -> Result<(), RuntimeError> {
        self.record(InterpreterCall::Import(module.to_string()), module)
    }

    async fn reload_module(&self, module: &str) -> Result<(), RuntimeError> {
        self.record(InterpreterCall::Reload(module.to_string()), module)
    }
}

/// Engine host with a runtime fixed up front
#[derive(Default)]
pub struct StaticEngineHost {
    runtime: Option<Arc<dyn Interpreter>>,
    scripts: Mutex<Vec<String>>,
}

impl StaticEngineHost {
    /// Host whose engine becomes ready with `runtime`
    pub fn new(runtime: Arc<dyn Interpreter>) -> Self {
        Self {
            runtime: Some(runtime),
            scripts: Mutex::new(Vec::new()),
        }
    }

    /// Host whose engine never becomes ready
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Injected script URLs
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait(?Send)]
impl EngineHost for StaticEngineHost {
    fn inject_script(&self, src: &str) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push(src.to_string());
        }
    }

    async fn ready(&self) -> Result<Arc<dyn Interpreter>, EngineError> {
        self.runtime.clone().ok_or_else(|| EngineError {
            message: "engine entry point never appeared".to_string(),
        })
    }
}
