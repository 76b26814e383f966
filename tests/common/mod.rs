//! 测试辅助工具
//!
//! A small static site and a page wired over it.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use beepy_workspace::{
    page_with_vfs, Bootstrapper, DryRunInterpreter, LoaderConfig, MemoryFileSystem,
    MemoryHttpClient, StaticEngineHost, VirtualFileSystem, ROOT_PACKAGE,
};

/// Site layout: a docs page with its own package, a root package that
/// imports a sibling module, and a settings include.
pub fn site() -> MemoryHttpClient {
    MemoryHttpClient::new()
        .with_file("__init__.py", "from views import home")
        .with_file("views.py", "def home(): pass")
        .with_file("docs/guide/__init__.py", "GUIDE = True")
        .with_file("config/settings.py", "DEBUG = True")
        .with_html_fallback()
}

pub struct Page {
    pub server: MemoryHttpClient,
    pub fs: Arc<MemoryFileSystem>,
    pub interp: Arc<DryRunInterpreter>,
    pub boot: Bootstrapper,
}

impl Page {
    pub fn open(server: MemoryHttpClient, config: LoaderConfig, page_path: &str) -> Self {
        let fs = Arc::new(MemoryFileSystem::new());
        let interp = Arc::new(DryRunInterpreter::new());
        let host = Arc::new(StaticEngineHost::new(interp.clone()));
        let boot = page_with_vfs(
            config,
            host,
            Arc::new(server.clone()),
            fs.clone(),
            page_path,
        );
        Self {
            server,
            fs,
            interp,
            boot,
        }
    }

    pub fn read(&self, path: &str) -> Option<String> {
        let full = format!("{}/{}", ROOT_PACKAGE, path);
        self.fs
            .read_file(Path::new(&full))
            .ok()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }
}
