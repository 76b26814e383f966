//! Module identifiers and identifier normalization

/// Package that holds all application code inside the virtual filesystem
pub const ROOT_PACKAGE: &str = "__beepy_root__";

/// Framework package name
pub const FRAMEWORK_PACKAGE: &str = "beepy";

/// File that marks a directory as a package
pub const PACKAGE_MARKER: &str = "__init__.py";

/// Source file extension, without the dot
pub const SOURCE_EXT: &str = "py";

/// Error type for module ID parsing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid module path: {0}")]
    InvalidModulePath(String),

    #[error("Empty component in path: {0}")]
    EmptyComponent(String),
}

/// Module identifier
///
/// Represents a dotted module path like "app.views" as components
/// ["app", "views"]. The empty identifier is the root package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    /// "app.views" -> ["app", "views"]
    pub components: Vec<String>,
}

impl ModuleId {
    /// The root package
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parse a dotted module path
    ///
    /// # Examples
    /// ```
    /// use beepy_loader::ModuleId;
    ///
    /// let id = ModuleId::parse("app.views").unwrap();
    /// assert_eq!(id.components, vec!["app", "views"]);
    ///
    /// assert!(ModuleId::parse("").unwrap().is_root());
    /// ```
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        if !s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(ParseError::InvalidModulePath(s.to_string()));
        }

        let components: Vec<String> = s.split('.').map(|s| s.to_string()).collect();

        // "app..views"
        if components.iter().any(|c| c.is_empty()) {
            return Err(ParseError::EmptyComponent(s.to_string()));
        }

        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the module name (last component)
    pub fn name(&self) -> &str {
        self.components.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// Name the interpreter imports this module under
    pub fn import_name(&self) -> String {
        if self.is_root() {
            ROOT_PACKAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.components.join("."))
    }
}

/// Strip leading `/` characters
pub fn lstrip(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Normalize a slash-style identifier into dotted form
///
/// Identifiers without `/` are returned unchanged. A leading `..` is
/// rewritten relative to the parent of the page's directory, a leading
/// `.` relative to the page's directory.
///
/// `page_path` is the path part of the page URL, e.g. `/docs/index.html`.
pub fn normalize_identifier(identifier: &str, page_path: &str) -> String {
    if !identifier.contains('/') {
        return identifier.to_string();
    }

    let page_parts: Vec<&str> = page_path.split('/').collect();
    let page_prefix = |drop: usize| page_parts[..page_parts.len().saturating_sub(drop)].join("/");

    let rewritten = if let Some(rest) = identifier.strip_prefix("..") {
        format!("{}{}", page_prefix(2), rest)
    } else if let Some(rest) = identifier.strip_prefix('.') {
        format!("{}{}", page_prefix(1), rest)
    } else {
        identifier.to_string()
    };

    lstrip(&rewritten).replace('/', ".")
}
