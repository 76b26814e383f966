//! 路径解析器
//!
//! Splits identifiers into directory and leaf parts and makes sure every
//! directory on the way exists as a package inside the virtual root.

use std::path::Path;
use std::sync::Arc;

use beepy_config::Component;
use beepy_vfs::{VfsResult, VirtualFileSystem};
use serde::Serialize;
use tracing::debug;

use crate::context::LoadContext;
use crate::module_id::{lstrip, PACKAGE_MARKER};

const TARGET: &str = Component::Resolver.target();

/// Separator used by an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `app.views`
    Module,
    /// `app/views.py`
    File,
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Module => '.',
            Separator::File => '/',
        }
    }
}

/// Identifier split into directory and leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPath {
    /// Directory, possibly prefixed with the current directory
    pub directory_path: String,
    /// Final component
    pub leaf_name: String,
    /// Directory relative to the virtual root, never prefixed
    pub package_relative_path: String,
}

impl ResolvedPath {
    /// Split an identifier without touching the filesystem
    ///
    /// # Examples
    /// ```
    /// use beepy_loader::{ResolvedPath, Separator};
    ///
    /// let p = ResolvedPath::parse("app.views.list", Separator::Module);
    /// assert_eq!(p.directory_path, "app/views");
    /// assert_eq!(p.leaf_name, "list");
    /// ```
    pub fn parse(identifier: &str, separator: Separator) -> Self {
        let sep = separator.as_char();
        let trimmed = lstrip(identifier.trim_start_matches(sep));
        let (directory, leaf) = match trimmed.rsplit_once(sep) {
            Some((dir, leaf)) => (dir.split(sep).collect::<Vec<_>>().join("/"), leaf),
            None => (String::new(), trimmed),
        };

        Self {
            package_relative_path: directory.clone(),
            directory_path: directory,
            leaf_name: leaf.to_string(),
        }
    }

    /// Directory and leaf joined with `/`
    pub fn full_path(&self) -> String {
        match (self.directory_path.is_empty(), self.leaf_name.is_empty()) {
            (true, _) => self.leaf_name.clone(),
            (false, true) => self.directory_path.clone(),
            (false, false) => format!("{}/{}", self.directory_path, self.leaf_name),
        }
    }
}

/// Path resolver bound to a virtual root
pub struct PathResolver {
    vfs: Arc<dyn VirtualFileSystem>,
    root: String,
}

impl PathResolver {
    /// Create a resolver whose packages live under `root`
    pub fn new(vfs: Arc<dyn VirtualFileSystem>, root: impl Into<String>) -> Self {
        Self {
            vfs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Create the virtual root if it is missing
    pub fn ensure_root(&self) -> VfsResult<()> {
        let root = Path::new(&self.root);
        if !self.vfs.exists(root) {
            self.vfs.mkdir(root)?;
            debug!(target: TARGET, root = %self.root, "created virtual root");
        }
        Ok(())
    }

    /// Split `identifier` and materialize its directory chain
    ///
    /// With `add_current_path`, the returned directory is prefixed with
    /// the context's current directory. `package_relative_path` keeps the
    /// unprefixed form either way.
    pub fn resolve(
        &self,
        ctx: &LoadContext,
        identifier: &str,
        separator: Separator,
        add_current_path: bool,
    ) -> VfsResult<ResolvedPath> {
        let mut resolved = ResolvedPath::parse(identifier, separator);

        if !resolved.directory_path.is_empty() {
            self.ensure_dirs(&resolved.directory_path, false)?;
        }
        if add_current_path {
            resolved.directory_path = ctx.populate_current_path(&resolved.directory_path);
        }

        debug!(
            target: TARGET,
            identifier,
            directory = %resolved.directory_path,
            leaf = %resolved.leaf_name,
            "resolved identifier"
        );
        Ok(resolved)
    }

    /// Create every missing directory of `path` under the root
    ///
    /// Each new directory gets an empty package marker. The last segment
    /// is skipped when `strip_file_name` is set.
    pub fn ensure_dirs(&self, path: &str, strip_file_name: bool) -> VfsResult<()> {
        let mut parts: Vec<&str> = lstrip(path).split('/').collect();
        if strip_file_name {
            parts.pop();
        }

        let mut prefix = self.root.clone();
        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            prefix = format!("{}/{}", prefix, part);
            let dir = Path::new(&prefix);
            if self.vfs.exists(dir) {
                continue;
            }
            self.vfs.mkdir(dir)?;
            let marker = format!("{}/{}", prefix, PACKAGE_MARKER);
            self.vfs.write_file(Path::new(&marker), b"")?;
            debug!(target: TARGET, dir = %prefix, "created package directory");
        }
        Ok(())
    }
}
