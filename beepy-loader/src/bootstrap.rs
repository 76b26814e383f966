//! Runtime bootstrapper
//!
//! Drives the load sequence: engine, system packages, requirements,
//! include files, application bundle, entry point, dev reload channel.
//! Every step assumes the previous ones completed.

use std::sync::Arc;

use beepy_config::{Component, LoaderConfig, ENV_FILE};
use beepy_vfs::VirtualFileSystem;
use futures::future::{join_all, LocalBoxFuture};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::LoadContext;
use crate::engine::{EngineHost, Interpreter, ENGINE_SCRIPT, GLOBALS_BRIDGE, INSTALLER_PACKAGE};
use crate::error::{BootError, BootResult, LoadError, RuntimeError};
use crate::gateway::LoadOptions;
use crate::import_hook::ImportHook;
use crate::loader::{LoadModuleOptions, LoadedModule, ModuleLoader, WriteTarget};
use crate::module_id::{ModuleId, PACKAGE_MARKER, ROOT_PACKAGE};
use crate::registry::ModuleRegistry;
use crate::reload::{ChannelState, DevReloadChannel, ReloadPlan, ReloadTransport};
use crate::resolver::{ResolvedPath, Separator};

const TARGET: &str = Component::Bootstrap.target();

/// Application bundle package name
pub const BUNDLE_PACKAGE: &str = "beepy_web";

/// Local development wheel, relative to the dev path
pub const DEV_BUNDLE_WHEEL: &str = "dist/beepy_web-0.0a0-py3-none-any.whl";

const AUTO_LOAD_HINT: &str = "You can add __init__.py near index.html to auto-load your code";

/// 加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotStarted,
    LoadingRuntime,
    RuntimeReady,
    LoadingModules,
    Ready,
    ReloadInProgress,
}

impl LoadState {
    /// Strictly forward, except the dev reload cycle
    pub fn can_transition_to(self, next: LoadState) -> bool {
        use LoadState::*;
        matches!(
            (self, next),
            (NotStarted, LoadingRuntime)
                | (LoadingRuntime, RuntimeReady)
                | (RuntimeReady, LoadingModules)
                | (LoadingModules, Ready)
                | (Ready, ReloadInProgress)
                | (ReloadInProgress, Ready)
        )
    }
}

/// Custom entry point, replaces module auto-discovery
pub type EntryHook = Box<dyn Fn() -> LocalBoxFuture<'static, Result<(), RuntimeError>>>;

/// Runtime bootstrapper
pub struct Bootstrapper {
    config: LoaderConfig,
    host: Arc<dyn EngineHost>,
    loader: Arc<ModuleLoader>,
    registry: ModuleRegistry,
    runtime: Option<Arc<dyn Interpreter>>,
    entry_hook: Option<EntryHook>,
    reload_transport: Option<Arc<dyn ReloadTransport>>,
    channel: DevReloadChannel,
    state: LoadState,
    ctx: LoadContext,
}

impl Bootstrapper {
    pub fn new(config: LoaderConfig, host: Arc<dyn EngineHost>, loader: ModuleLoader) -> Self {
        Self {
            config,
            host,
            loader: Arc::new(loader),
            registry: ModuleRegistry::new(),
            runtime: None,
            entry_hook: None,
            reload_transport: None,
            channel: DevReloadChannel::new(),
            state: LoadState::NotStarted,
            ctx: LoadContext::new(),
        }
    }

    /// Run `hook` instead of auto-discovering the entry module
    pub fn with_entry_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> LocalBoxFuture<'static, Result<(), RuntimeError>> + 'static,
    {
        self.entry_hook = Some(Box::new(hook));
        self
    }

    /// Transport for the dev reload channel
    pub fn with_reload_transport(mut self, transport: Arc<dyn ReloadTransport>) -> Self {
        self.reload_transport = Some(transport);
        self
    }

    /// Replace the dev reload channel, e.g. to use another address
    pub fn with_reload_channel(mut self, channel: DevReloadChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn loader(&self) -> &Arc<ModuleLoader> {
        &self.loader
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn reload_channel(&self) -> &DevReloadChannel {
        &self.channel
    }

    pub fn runtime(&self) -> BootResult<&Arc<dyn Interpreter>> {
        self.runtime.as_ref().ok_or(BootError::RuntimeNotReady)
    }

    /// Import hook for the interpreter's module finder
    ///
    /// Requirements and the root package are never looked up on the server.
    pub fn import_hook(&self) -> ImportHook {
        let framework_path = self
            .config
            .framework_path
            .clone()
            .unwrap_or_else(|| self.config.dev_path.clone());
        let mut known_missing = self.config.requirements.resolve();
        known_missing.push(ROOT_PACKAGE.to_string());
        ImportHook::new(Arc::clone(&self.loader), framework_path).with_known_missing(known_missing)
    }

    fn transition(&mut self, next: LoadState) -> BootResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(BootError::InvalidTransition {
                current: self.state,
                next,
            });
        }
        debug!(target: TARGET, from = ?self.state, to = ?next, "state transition");
        self.state = next;
        Ok(())
    }

    /// Run the full load sequence
    pub async fn load(&mut self) -> BootResult<()> {
        self.transition(LoadState::LoadingRuntime)?;
        let script = format!("{}{}", self.config.engine_index_url(), ENGINE_SCRIPT);
        self.host.inject_script(&script);
        info!(target: TARGET, %script, "engine script injected");

        let runtime = self.host.ready().await?;
        info!(target: TARGET, version = %runtime.version(), "interpreter ready");
        self.runtime = Some(Arc::clone(&runtime));
        self.transition(LoadState::RuntimeReady)?;

        self.loader.resolver().ensure_root()?;
        runtime
            .load_system_package(INSTALLER_PACKAGE)
            .await
            .map_err(|source| BootError::Install {
                package: INSTALLER_PACKAGE.to_string(),
                source,
            })?;

        self.install_requirements(runtime.as_ref()).await;
        self.load_includes().await;
        self.install_bundle(runtime.as_ref()).await?;
        runtime.run(GLOBALS_BRIDGE)?;

        self.transition(LoadState::LoadingModules)?;
        self.run_entry(false).await?;
        self.transition(LoadState::Ready)?;
        info!(target: TARGET, "application loaded");

        if self.config.development {
            self.open_reload_channel().await;
        }
        Ok(())
    }

    /// Install requirements concurrently; failures are logged
    async fn install_requirements(&self, runtime: &dyn Interpreter) {
        let requirements = self.config.requirements.resolve();
        if requirements.is_empty() {
            return;
        }
        debug!(target: TARGET, ?requirements, "installing requirements");

        let installs = requirements.iter().map(|req| runtime.install(req));
        for (req, result) in requirements.iter().zip(join_all(installs).await) {
            if let Err(err) = result {
                warn!(target: TARGET, requirement = %req, error = %err, "requirement install failed");
            }
        }
    }

    /// Write include files into the virtual root, best effort
    async fn load_includes(&self) {
        let gateway = self.loader.gateway();
        let vfs = self.loader.vfs();
        let mut env_missing = false;

        for file in &self.config.include_files {
            let path = ResolvedPath::parse(file, Separator::File).full_path();
            let result = async {
                self.loader.resolver().ensure_dirs(&path, true)?;
                gateway
                    .write(&mut LoadContext::new(), vfs.as_ref(), &path, None)
                    .await?;
                Ok::<_, BootError>(())
            }
            .await;

            match result {
                Ok(()) => debug!(target: TARGET, file = %path, "include loaded"),
                Err(_) if file == ENV_FILE => env_missing = true,
                Err(err) => {
                    warn!(target: TARGET, file = %file, error = %err, "File {} was not found on the server", file)
                }
            }
        }

        if env_missing {
            let fallback = format!("{}/{}", self.config.dev_path, ENV_FILE);
            let mut ctx = LoadContext::new();
            let result = match gateway.load(&mut ctx, &fallback, LoadOptions::default()).await {
                Ok(content) => gateway
                    .write(&mut ctx, vfs.as_ref(), ENV_FILE, Some(&content))
                    .await
                    .map(|_| ()),
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                debug!(target: TARGET, error = %err, "no env file");
            }
        }
    }

    /// Install the application bundle, or materialize framework sources
    async fn install_bundle(&self, runtime: &dyn Interpreter) -> BootResult<()> {
        if let Some(base) = &self.config.framework_path {
            self.loader.load_framework(base).await?;
            return Ok(());
        }

        let package = if self.config.is_dev_framework() {
            format!("{}/{}", self.config.dev_path, DEV_BUNDLE_WHEEL)
        } else {
            format!("{}=={}", BUNDLE_PACKAGE, self.config.framework_version)
        };
        runtime
            .install(&package)
            .await
            .map_err(|source| BootError::Install {
                package: package.clone(),
                source,
            })?;
        info!(target: TARGET, %package, "application bundle installed");
        Ok(())
    }

    /// Entry-point step
    ///
    /// In reload mode a missing entry module is ignored silently.
    pub async fn run_entry(&mut self, reload: bool) -> BootResult<()> {
        self.ctx.reset();

        if let Some(hook) = &self.entry_hook {
            debug!(target: TARGET, "running custom entry hook");
            return hook().await.map_err(BootError::from);
        }

        if let Some(module) = self.config.entry_module.clone() {
            return match self.enter_root_module(&module) {
                Err(BootError::Load(LoadError::ModuleNotFound { tried, .. })) if reload => {
                    debug!(target: TARGET, %module, ?tried, "entry module missing during reload");
                    Ok(())
                }
                Err(BootError::Load(source)) => Err(BootError::EntryPoint { module, source }),
                other => other.map(|_| ()),
            };
        }

        let options = LoadModuleOptions {
            check_exists: true,
            ..Default::default()
        };
        match self.loader.load_module(&mut self.ctx, "", options) {
            Ok(loaded) => self.import(&loaded).map(|_| ()),
            Err(LoadError::ModuleNotFound { tried, .. }) => {
                if reload {
                    debug!(target: TARGET, ?tried, "no root package");
                } else {
                    info!(target: TARGET, "{}", AUTO_LOAD_HINT);
                }
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Load `module` as a page module and import it
    ///
    /// Returns the imported dotted name.
    pub fn enter_module(&mut self, module: &str) -> BootResult<String> {
        self.ctx.enter(module);
        let options = LoadModuleOptions {
            write_target: WriteTarget::Raw,
            add_current_path: false,
            check_exists: false,
        };
        let result = self
            .loader
            .load_module(&mut self.ctx, module, options)
            .map_err(BootError::from)
            .and_then(|loaded| self.import(&loaded));
        self.ctx.leave();
        result
    }

    /// Load `module` as the root package and import it
    pub fn enter_root_module(&mut self, module: &str) -> BootResult<String> {
        let options = LoadModuleOptions {
            write_target: WriteTarget::Explicit(PACKAGE_MARKER.to_string()),
            add_current_path: false,
            check_exists: false,
        };
        let loaded = self.loader.load_module(&mut self.ctx, module, options)?;
        let root = ModuleId::root().import_name();
        self.registry.register(&root, Some(loaded.virtual_path));
        self.runtime()?.import_module(&root)?;
        Ok(root)
    }

    fn import(&self, loaded: &LoadedModule) -> BootResult<String> {
        let name = ModuleId::parse(&loaded.module_path)
            .map_err(LoadError::from)?
            .import_name();
        self.registry
            .register(&name, Some(loaded.virtual_path.clone()));
        self.runtime()?.import_module(&name)?;
        info!(target: TARGET, module = %name, "module imported");
        Ok(name)
    }

    async fn open_reload_channel(&mut self) -> ChannelState {
        match &self.reload_transport {
            Some(transport) => self.channel.open(transport.as_ref()).await,
            None => {
                debug!(target: TARGET, "no reload transport configured");
                ChannelState::Disconnected
            }
        }
    }

    /// Handle one file-changed notification
    pub async fn on_file_changed(&mut self, message: &str) -> BootResult<()> {
        self.transition(LoadState::ReloadInProgress)?;
        let result = self.apply_reload(message).await;
        self.transition(LoadState::Ready)?;
        result
    }

    async fn apply_reload(&mut self, message: &str) -> BootResult<()> {
        let runtime = Arc::clone(self.runtime()?);

        match ReloadPlan::for_message(message, self.loader.reload_cache()) {
            ReloadPlan::EntryOnly => {}
            ReloadPlan::FileChanged {
                source_path,
                rewrite,
            } => {
                if let Some((virtual_path, module)) = rewrite {
                    let gateway = self.loader.gateway();
                    let mut ctx = LoadContext::new();
                    let content = gateway
                        .load(&mut ctx, &source_path, LoadOptions::default())
                        .await?;
                    gateway
                        .write(&mut ctx, self.loader.vfs().as_ref(), &virtual_path, Some(&content))
                        .await?;
                    self.registry.reload(runtime.as_ref(), &module).await?;
                } else {
                    debug!(target: TARGET, file = %source_path, "no module owns this file");
                }
                self.registry.reload(runtime.as_ref(), ROOT_PACKAGE).await?;
            }
        }

        self.run_entry(true).await
    }

    /// Process reload notifications until the channel closes
    ///
    /// Messages are handled one at a time; a failed reload is logged and
    /// the next message is still processed.
    pub async fn serve_reloads(&mut self) {
        while let Some(message) = self.channel.next_message().await {
            info!(target: crate::reload::TARGET, file = %message, "file changed");
            if let Err(err) = self.on_file_changed(&message).await {
                warn!(target: crate::reload::TARGET, file = %message, error = %err, "reload failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DryRunInterpreter, InterpreterCall, StaticEngineHost};
    use crate::gateway::{FileGateway, MemoryHttpClient};
    use beepy_vfs::MemoryFileSystem;

    fn bootstrapper(
        client: MemoryHttpClient,
        config: LoaderConfig,
    ) -> (Arc<DryRunInterpreter>, Bootstrapper) {
        let interp = Arc::new(DryRunInterpreter::new());
        let host = Arc::new(StaticEngineHost::new(interp.clone()));
        let fs = Arc::new(MemoryFileSystem::new());
        let gateway = Arc::new(FileGateway::new(Arc::new(client), "http://h", ROOT_PACKAGE));
        let loader = ModuleLoader::new(fs, gateway, ROOT_PACKAGE);
        (interp, Bootstrapper::new(config, host, loader))
    }

    #[test]
    fn test_transitions() {
        use LoadState::*;
        assert!(NotStarted.can_transition_to(LoadingRuntime));
        assert!(LoadingModules.can_transition_to(Ready));
        assert!(Ready.can_transition_to(ReloadInProgress));
        assert!(ReloadInProgress.can_transition_to(Ready));

        assert!(!NotStarted.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(LoadingRuntime));
        assert!(!RuntimeReady.can_transition_to(LoadingRuntime));
        assert!(!ReloadInProgress.can_transition_to(LoadingModules));
    }

    #[tokio::test]
    async fn test_reload_before_ready_is_rejected() {
        let (_, mut boot) = bootstrapper(MemoryHttpClient::new(), LoaderConfig::default());
        let err = boot.on_file_changed("__").await.unwrap_err();
        assert_eq!(
            err,
            BootError::InvalidTransition {
                current: LoadState::NotStarted,
                next: LoadState::ReloadInProgress,
            }
        );
    }

    #[tokio::test]
    async fn test_load_without_entry_module_reaches_ready() {
        let (interp, mut boot) = bootstrapper(MemoryHttpClient::new(), LoaderConfig::default());
        boot.load().await.unwrap();
        assert_eq!(boot.state(), LoadState::Ready);
        assert!(!interp
            .calls()
            .iter()
            .any(|c| matches!(c, InterpreterCall::Import(_))));
    }

    #[tokio::test]
    async fn test_engine_never_ready() {
        let fs = Arc::new(MemoryFileSystem::new());
        let gateway = Arc::new(FileGateway::new(
            Arc::new(MemoryHttpClient::new()),
            "http://h",
            ROOT_PACKAGE,
        ));
        let loader = ModuleLoader::new(fs, gateway, ROOT_PACKAGE);
        let mut boot = Bootstrapper::new(
            LoaderConfig::default(),
            Arc::new(StaticEngineHost::unavailable()),
            loader,
        );
        assert!(matches!(boot.load().await, Err(BootError::EngineInit(_))));
        assert_eq!(boot.state(), LoadState::LoadingRuntime);
        assert!(matches!(boot.runtime(), Err(BootError::RuntimeNotReady)));
    }

    #[tokio::test]
    async fn test_released_bundle_is_installed_by_version() {
        let config = LoaderConfig {
            framework_version: "0.4.2".to_string(),
            ..Default::default()
        };
        let (interp, mut boot) = bootstrapper(MemoryHttpClient::new(), config);
        boot.load().await.unwrap();
        assert!(interp
            .calls()
            .contains(&InterpreterCall::Install("beepy_web==0.4.2".into())));
    }

    #[tokio::test]
    async fn test_import_hook_skips_requirements() {
        let config = LoaderConfig::default().with_requirements_producer(|| vec!["numpy".into()]);
        let (_, boot) = bootstrapper(MemoryHttpClient::new(), config);
        let hook = boot.import_hook();
        assert!(hook.is_missing("numpy"));
        assert!(hook.is_missing(ROOT_PACKAGE));
        assert!(!hook.is_missing("app"));
    }
}
