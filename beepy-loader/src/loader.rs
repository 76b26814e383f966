//! Module loader
//!
//! Materializes application modules in the virtual filesystem. For a
//! module `a.b`, the package form `a/b/__init__.py` is tried before the
//! leaf form `a/b.py`; the root package only has a package form.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use beepy_config::Component;
use beepy_vfs::VirtualFileSystem;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::context::LoadContext;
use crate::error::{LoadError, LoadResult};
use crate::gateway::{FileGateway, FileRecord, LoadOptions};
use crate::manifest::PackageManifest;
use crate::module_id::{
    lstrip, normalize_identifier, ModuleId, FRAMEWORK_PACKAGE, PACKAGE_MARKER, SOURCE_EXT,
};
use crate::resolver::{PathResolver, ResolvedPath, Separator};

const TARGET: &str = Component::Loader.target();

/// Where a loaded module is written, relative to the virtual root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WriteTarget {
    /// Fetched path with its directory replaced by the package-relative one
    #[default]
    Derived,
    /// Fetched path unchanged
    Raw,
    /// Fixed path
    Explicit(String),
}

/// Options for [`ModuleLoader::load_module`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadModuleOptions {
    pub write_target: WriteTarget,
    /// Resolve relative to the last loaded file
    pub add_current_path: bool,
    /// Probe with HEAD before fetching
    pub check_exists: bool,
}

impl Default for LoadModuleOptions {
    fn default() -> Self {
        Self {
            write_target: WriteTarget::Derived,
            add_current_path: true,
            check_exists: false,
        }
    }
}

/// Result of a successful module load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedModule {
    /// Normalized identifier that was requested
    pub module: String,
    /// Dotted path of the fetched location
    pub module_path: String,
    /// Path the source was fetched from
    pub source_path: String,
    /// Path written, relative to the virtual root
    pub virtual_path: String,
}

/// Where a fetched file went and which module owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadCacheEntry {
    pub virtual_path: String,
    /// None for the root package
    pub module: Option<String>,
}

/// Source path -> reload cache entry
///
/// Only ever grows; a later load of the same source replaces its entry.
#[derive(Debug, Default)]
pub struct ReloadCache {
    entries: RwLock<HashMap<String, ReloadCacheEntry>>,
}

impl ReloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, source_path: &str, entry: ReloadCacheEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(lstrip(source_path).to_string(), entry);
        }
    }

    pub fn get(&self, source_path: &str) -> Option<ReloadCacheEntry> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(lstrip(source_path)).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Module loader
pub struct ModuleLoader {
    resolver: PathResolver,
    gateway: Arc<FileGateway>,
    vfs: Arc<dyn VirtualFileSystem>,
    reload_cache: Arc<ReloadCache>,
    page_path: String,
}

impl ModuleLoader {
    /// Create a loader writing under `root`
    pub fn new(
        vfs: Arc<dyn VirtualFileSystem>,
        gateway: Arc<FileGateway>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            resolver: PathResolver::new(Arc::clone(&vfs), root),
            gateway,
            vfs,
            reload_cache: Arc::new(ReloadCache::new()),
            page_path: String::from("/"),
        }
    }

    /// Path part of the hosting page URL, used for `./` and `../` identifiers
    pub fn with_page_path(mut self, page_path: impl Into<String>) -> Self {
        self.page_path = page_path.into();
        self
    }

    /// Share an existing reload cache
    pub fn with_reload_cache(mut self, cache: Arc<ReloadCache>) -> Self {
        self.reload_cache = cache;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn vfs(&self) -> &Arc<dyn VirtualFileSystem> {
        &self.vfs
    }

    pub fn gateway(&self) -> &Arc<FileGateway> {
        &self.gateway
    }

    pub fn reload_cache(&self) -> &Arc<ReloadCache> {
        &self.reload_cache
    }

    /// Fetch a module and write it into the virtual root
    pub fn load_module(
        &self,
        ctx: &mut LoadContext,
        identifier: &str,
        options: LoadModuleOptions,
    ) -> LoadResult<LoadedModule> {
        let module = normalize_identifier(identifier, &self.page_path);
        ModuleId::parse(&module)?;

        let resolved =
            self.resolver
                .resolve(ctx, &module, Separator::Module, options.add_current_path)?;
        let full_path = resolved.full_path();

        let mut tried = Vec::new();
        let mut found = None;
        for candidate in candidate_paths(&full_path, &resolved.leaf_name) {
            tried.push(candidate.clone());
            let load_options = LoadOptions {
                check_exists: options.check_exists,
            };
            match self.gateway.load_sync(ctx, &candidate, load_options) {
                Ok(content) if looks_like_html(&content) => {
                    debug!(target: TARGET, %candidate, "got an HTML page, not a module");
                }
                Ok(content) => {
                    found = Some((candidate, content));
                    break;
                }
                Err(err) => {
                    debug!(target: TARGET, %candidate, error = %err, "candidate unavailable");
                }
            }
        }

        let Some((source_path, content)) = found else {
            return Err(LoadError::ModuleNotFound { module, tried });
        };

        let virtual_path = match options.write_target {
            WriteTarget::Explicit(path) => lstrip(&path).to_string(),
            WriteTarget::Raw => source_path.clone(),
            WriteTarget::Derived => derive_write_target(&source_path, &resolved),
        };
        if virtual_path.contains('/') {
            self.resolver.ensure_dirs(&virtual_path, true)?;
        }

        self.reload_cache.record(
            &source_path,
            ReloadCacheEntry {
                virtual_path: virtual_path.clone(),
                module: (!module.is_empty()).then(|| module.clone()),
            },
        );
        self.gateway
            .write_sync(ctx, self.vfs.as_ref(), &virtual_path, Some(&content))?;

        info!(target: TARGET, %module, %source_path, %virtual_path, "module loaded");
        Ok(LoadedModule {
            module,
            module_path: full_path.replace('/', "."),
            source_path,
            virtual_path,
        })
    }

    /// Fetch the framework package from `base_url` into the virtual root
    ///
    /// The package marker is fetched first; every module it lists is then
    /// fetched concurrently. Framework fetches do not move any caller's
    /// cursor.
    pub async fn load_framework(&self, base_url: &str) -> LoadResult<Vec<FileRecord>> {
        let base = base_url.trim_end_matches('/');
        let marker_url = format!("{}/{}/{}", base, FRAMEWORK_PACKAGE, PACKAGE_MARKER);
        let marker = self
            .gateway
            .load(&mut LoadContext::new(), &marker_url, LoadOptions::default())
            .await
            .map_err(|err| {
                debug!(target: TARGET, error = %err, "framework marker unavailable");
                LoadError::ModuleNotFound {
                    module: FRAMEWORK_PACKAGE.to_string(),
                    tried: vec![marker_url.clone()],
                }
            })?;

        let manifest = PackageManifest::parse(&marker, FRAMEWORK_PACKAGE);
        self.resolver.ensure_dirs(FRAMEWORK_PACKAGE, false)?;

        let fetches = manifest.module_files().into_iter().map(|file| {
            let url = format!("{}/{}/{}", base, FRAMEWORK_PACKAGE, file);
            async move {
                let content = self
                    .gateway
                    .load(&mut LoadContext::new(), &url, LoadOptions::default())
                    .await?;
                Ok::<_, LoadError>((format!("{}/{}", FRAMEWORK_PACKAGE, file), content))
            }
        });
        let modules = join_all(fetches)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(modules.len() + 1);
        let marker_path = format!("{}/{}", FRAMEWORK_PACKAGE, PACKAGE_MARKER);
        for (path, content) in std::iter::once((marker_path, marker)).chain(modules) {
            records.push(self.gateway.write_sync(
                &mut LoadContext::new(),
                self.vfs.as_ref(),
                &path,
                Some(&content),
            )?);
        }

        info!(
            target: TARGET,
            modules = manifest.exports.len(),
            "framework package materialized"
        );
        Ok(records)
    }

    /// Whether `path` exists under the virtual root
    pub fn is_materialized(&self, path: &str) -> bool {
        let full = format!("{}/{}", self.resolver.root(), lstrip(path));
        self.vfs.is_file(Path::new(&full))
    }
}

/// Package form first, then leaf form
fn candidate_paths(full_path: &str, leaf_name: &str) -> Vec<String> {
    let mut candidates = Vec::with_capacity(2);
    if full_path.is_empty() {
        candidates.push(PACKAGE_MARKER.to_string());
    } else {
        candidates.push(format!("{}/{}", full_path, PACKAGE_MARKER));
    }
    if !leaf_name.is_empty() {
        candidates.push(format!("{}.{}", full_path, SOURCE_EXT));
    }
    candidates
}

/// Replace the fetched directory prefix with the package-relative one
fn derive_write_target(source_path: &str, resolved: &ResolvedPath) -> String {
    if resolved.directory_path.is_empty() {
        return source_path.to_string();
    }
    match source_path.strip_prefix(&resolved.directory_path) {
        Some(rest) => {
            let derived = format!("{}{}", resolved.package_relative_path, rest);
            lstrip(&derived).to_string()
        }
        None => source_path.to_string(),
    }
}

/// Dev servers answer unknown paths with their index page
pub fn looks_like_html(content: &str) -> bool {
    content.trim_start().starts_with('<')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Method, MemoryHttpClient};
    use crate::module_id::ROOT_PACKAGE;
    use beepy_vfs::MemoryFileSystem;

    fn setup(client: MemoryHttpClient) -> (Arc<MemoryFileSystem>, ModuleLoader) {
        let fs = Arc::new(MemoryFileSystem::new());
        let gateway = Arc::new(FileGateway::new(
            Arc::new(client),
            "http://localhost:8000",
            ROOT_PACKAGE,
        ));
        let loader = ModuleLoader::new(fs.clone(), gateway, ROOT_PACKAGE);
        loader.resolver().ensure_root().unwrap();
        (fs, loader)
    }

    fn read(fs: &MemoryFileSystem, path: &str) -> String {
        String::from_utf8(fs.read_file(Path::new(path)).unwrap()).unwrap()
    }

    #[test]
    fn test_candidate_paths() {
        assert_eq!(candidate_paths("", ""), vec!["__init__.py"]);
        assert_eq!(
            candidate_paths("app/views", "views"),
            vec!["app/views/__init__.py", "app/views.py"]
        );
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("  \n<!DOCTYPE html>"));
        assert!(!looks_like_html("x = '<p>'"));
        assert!(!looks_like_html(""));
    }

    #[test]
    fn test_package_form_wins() {
        let client = MemoryHttpClient::new()
            .with_file("app/__init__.py", "PACKAGE = True")
            .with_file("app.py", "PACKAGE = False");
        let (fs, loader) = setup(client.clone());

        let loaded = loader
            .load_module(&mut LoadContext::new(), "app", LoadModuleOptions::default())
            .unwrap();
        assert_eq!(loaded.source_path, "app/__init__.py");
        assert_eq!(loaded.module_path, "app");
        assert_eq!(read(&fs, "__beepy_root__/app/__init__.py"), "PACKAGE = True");
        assert_eq!(client.count(Method::Get, "app.py"), 0);
    }

    #[test]
    fn test_leaf_form_fallback() {
        let client = MemoryHttpClient::new().with_file("app/views.py", "VIEWS = 1");
        let (fs, loader) = setup(client);

        let loaded = loader
            .load_module(&mut LoadContext::new(), "app.views", LoadModuleOptions::default())
            .unwrap();
        assert_eq!(loaded.virtual_path, "app/views.py");
        assert_eq!(read(&fs, "__beepy_root__/app/views.py"), "VIEWS = 1");
        assert_eq!(read(&fs, "__beepy_root__/app/__init__.py"), "");
    }

    #[test]
    fn test_html_response_counts_as_missing() {
        let client = MemoryHttpClient::new()
            .with_file("widgets.py", "W = 1")
            .with_html_fallback();
        let (_fs, loader) = setup(client);

        let loaded = loader
            .load_module(&mut LoadContext::new(), "widgets", LoadModuleOptions::default())
            .unwrap();
        assert_eq!(loaded.source_path, "widgets.py");
    }

    #[test]
    fn test_not_found_lists_both_candidates() {
        let (_fs, loader) = setup(MemoryHttpClient::new());
        let err = loader
            .load_module(&mut LoadContext::new(), "nope", LoadModuleOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            LoadError::ModuleNotFound {
                module: "nope".to_string(),
                tried: vec!["nope/__init__.py".to_string(), "nope.py".to_string()],
            }
        );
    }

    #[test]
    fn test_root_module_has_only_package_form() {
        let (_fs, loader) = setup(MemoryHttpClient::new());
        let err = loader
            .load_module(&mut LoadContext::new(), "", LoadModuleOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::ModuleNotFound { ref tried, .. } if tried == &["__init__.py"]));
    }

    #[test]
    fn test_check_exists_404_writes_nothing() {
        let client = MemoryHttpClient::new();
        let (fs, loader) = setup(client.clone());
        let options = LoadModuleOptions {
            check_exists: true,
            ..Default::default()
        };
        assert!(loader.load_module(&mut LoadContext::new(), "", options).is_err());
        assert_eq!(client.count(Method::Get, "__init__.py"), 0);
        assert!(!fs.exists(Path::new("__beepy_root__/__init__.py")));
        assert!(loader.reload_cache().is_empty());
    }

    #[test]
    fn test_relative_lookup_derives_write_target() {
        let client = MemoryHttpClient::new().with_file("site/app/views.py", "V = 2");
        let (fs, loader) = setup(client);

        let mut ctx = LoadContext::at("site/app/__init__.py");
        let loaded = loader
            .load_module(&mut ctx, "views", LoadModuleOptions::default())
            .unwrap();
        assert_eq!(loaded.source_path, "site/app/views.py");
        assert_eq!(loaded.virtual_path, "views.py");
        assert_eq!(read(&fs, "__beepy_root__/views.py"), "V = 2");
        assert_eq!(ctx.last_loaded_file(), "site/app/views.py");
    }

    #[test]
    fn test_nested_relative_lookup() {
        let client = MemoryHttpClient::new().with_file("site/pages/home.py", "H = 1");
        let (fs, loader) = setup(client);

        let mut ctx = LoadContext::at("site/__init__.py");
        let loaded = loader
            .load_module(&mut ctx, "pages.home", LoadModuleOptions::default())
            .unwrap();
        assert_eq!(loaded.virtual_path, "pages/home.py");
        assert_eq!(loaded.module_path, "site.pages.home");
        assert!(fs.is_file(Path::new("__beepy_root__/pages/home.py")));
    }

    #[test]
    fn test_raw_and_explicit_targets() {
        let client = MemoryHttpClient::new()
            .with_file("docs/page/__init__.py", "P = 1")
            .with_file("main.py", "M = 1");
        let (fs, loader) = setup(client);

        let raw = LoadModuleOptions {
            write_target: WriteTarget::Raw,
            add_current_path: false,
            check_exists: false,
        };
        let loaded = loader
            .load_module(&mut LoadContext::new(), "docs.page", raw)
            .unwrap();
        assert_eq!(loaded.virtual_path, "docs/page/__init__.py");
        assert_eq!(read(&fs, "__beepy_root__/docs/page/__init__.py"), "P = 1");

        let explicit = LoadModuleOptions {
            write_target: WriteTarget::Explicit(PACKAGE_MARKER.to_string()),
            add_current_path: false,
            check_exists: false,
        };
        loader
            .load_module(&mut LoadContext::new(), "main", explicit)
            .unwrap();
        assert_eq!(read(&fs, "__beepy_root__/__init__.py"), "M = 1");
    }

    #[test]
    fn test_reload_cache_entries() {
        let client = MemoryHttpClient::new()
            .with_file("__init__.py", "ROOT = 1")
            .with_file("app/views.py", "V = 1");
        let (_fs, loader) = setup(client);

        loader
            .load_module(&mut LoadContext::new(), "", LoadModuleOptions::default())
            .unwrap();
        loader
            .load_module(&mut LoadContext::new(), "app.views", LoadModuleOptions::default())
            .unwrap();

        let cache = loader.reload_cache();
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get("__init__.py"),
            Some(ReloadCacheEntry {
                virtual_path: "__init__.py".to_string(),
                module: None,
            })
        );
        assert_eq!(
            cache.get("/app/views.py").and_then(|e| e.module),
            Some("app.views".to_string())
        );
    }

    #[test]
    fn test_slash_identifier_is_normalized() {
        let client = MemoryHttpClient::new().with_file("docs/widgets.py", "W = 1");
        let (_fs, loader) = setup(client);
        let loader = loader.with_page_path("/docs/index.html");

        let options = LoadModuleOptions {
            add_current_path: false,
            ..Default::default()
        };
        let loaded = loader
            .load_module(&mut LoadContext::new(), "./widgets", options)
            .unwrap();
        assert_eq!(loaded.module, "docs.widgets");
    }

    #[test]
    fn test_invalid_identifier() {
        let (_fs, loader) = setup(MemoryHttpClient::new());
        let err = loader
            .load_module(&mut LoadContext::new(), "app..views", LoadModuleOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_load_framework() {
        let client = MemoryHttpClient::new()
            .with_file("static/beepy/__init__.py", "from beepy import tags, children\n")
            .with_file("static/beepy/tags.py", "TAGS = 1")
            .with_file("static/beepy/children.py", "CHILDREN = 1");
        let (fs, loader) = setup(client);

        let records = loader.load_framework("/static").await.unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.virtual_path.as_str()).collect();
        assert_eq!(paths, vec!["beepy/__init__.py", "beepy/tags.py", "beepy/children.py"]);
        assert_eq!(read(&fs, "__beepy_root__/beepy/tags.py"), "TAGS = 1");
        assert!(loader.is_materialized("beepy/children.py"));
    }

    #[tokio::test]
    async fn test_load_framework_missing_module_fails() {
        let client = MemoryHttpClient::new()
            .with_file("static/beepy/__init__.py", "from beepy import tags\n");
        let (_fs, loader) = setup(client);

        let err = loader.load_framework("static").await.unwrap_err();
        assert!(matches!(err, LoadError::Gateway(_)));
    }
}
