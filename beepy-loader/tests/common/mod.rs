//! 测试辅助工具
//!
//! Builds a bootstrapper over an in-memory server, filesystem and a
//! recording interpreter.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use beepy_config::LoaderConfig;
use beepy_loader::{
    Bootstrapper, DryRunInterpreter, FileGateway, MemoryHttpClient, MessageStream, ModuleLoader,
    ReloadError, ReloadTransport, StaticEngineHost, ROOT_PACKAGE,
};
use beepy_vfs::{MemoryFileSystem, VirtualFileSystem};
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use std::cell::RefCell;

pub const ORIGIN: &str = "http://localhost:8000";

/// Everything a test needs to drive and inspect a load
pub struct Harness {
    pub server: MemoryHttpClient,
    pub fs: Arc<MemoryFileSystem>,
    pub interp: Arc<DryRunInterpreter>,
    pub host: Arc<StaticEngineHost>,
    pub boot: Bootstrapper,
}

impl Harness {
    pub fn new(server: MemoryHttpClient, config: LoaderConfig) -> Self {
        Self::with_interpreter(server, config, DryRunInterpreter::new())
    }

    pub fn with_interpreter(
        server: MemoryHttpClient,
        config: LoaderConfig,
        interp: DryRunInterpreter,
    ) -> Self {
        Self::with_fs(server, config, interp, Arc::new(MemoryFileSystem::new()))
    }

    /// Share a filesystem the interpreter observer can also see
    pub fn with_fs(
        server: MemoryHttpClient,
        config: LoaderConfig,
        interp: DryRunInterpreter,
        fs: Arc<MemoryFileSystem>,
    ) -> Self {
        let interp = Arc::new(interp);
        let host = Arc::new(StaticEngineHost::new(interp.clone()));
        let gateway = Arc::new(FileGateway::new(
            Arc::new(server.clone()),
            ORIGIN,
            ROOT_PACKAGE,
        ));
        let loader = ModuleLoader::new(fs.clone(), gateway, ROOT_PACKAGE);
        Self {
            server,
            fs,
            interp,
            host: host.clone(),
            boot: Bootstrapper::new(config, host, loader),
        }
    }

    /// Adjust the bootstrapper with its builder methods
    pub fn configure(self, f: impl FnOnce(Bootstrapper) -> Bootstrapper) -> Self {
        let Harness {
            server,
            fs,
            interp,
            host,
            boot,
        } = self;
        Harness {
            server,
            fs,
            interp,
            host,
            boot: f(boot),
        }
    }

    /// Content written under the virtual root
    pub fn read(&self, path: &str) -> Option<String> {
        let full = format!("{}/{}", ROOT_PACKAGE, path);
        self.fs
            .read_file(Path::new(&full))
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Development config with a dev checkout under `/dev`
pub fn dev_config() -> LoaderConfig {
    LoaderConfig {
        development: true,
        dev_path: "/dev".to_string(),
        ..Default::default()
    }
}

/// Reload transport fed from the test through a channel
pub struct ChannelTransport {
    receiver: RefCell<Option<MessageStream>>,
}

impl ChannelTransport {
    pub fn new() -> (UnboundedSender<String>, Self) {
        let (sender, receiver) = unbounded();
        let transport = Self {
            receiver: RefCell::new(Some(receiver.boxed_local())),
        };
        (sender, transport)
    }
}

#[async_trait(?Send)]
impl ReloadTransport for ChannelTransport {
    async fn connect(&self, url: &str) -> Result<MessageStream, ReloadError> {
        self.receiver
            .borrow_mut()
            .take()
            .ok_or_else(|| ReloadError::Unavailable {
                url: url.to_string(),
                message: "already connected".to_string(),
            })
    }
}

/// Reload transport for a dev server that is not running
pub struct OfflineTransport;

#[async_trait(?Send)]
impl ReloadTransport for OfflineTransport {
    async fn connect(&self, url: &str) -> Result<MessageStream, ReloadError> {
        Err(ReloadError::Unavailable {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })
    }
}
