//! Package manifest parsing
//!
//! A package marker lists its modules with import statements:
//!
//! ```text
//! from beepy import framework, tags, children
//! ```

use crate::module_id::SOURCE_EXT;

/// Modules exported by a package marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    pub package: String,
    pub exports: Vec<String>,
}

impl PackageManifest {
    /// Collect every name imported from `package` in `source`
    ///
    /// Names keep their first-seen order and are deduplicated. Trailing
    /// comments, parentheses and `as` aliases are ignored.
    ///
    /// # Examples
    /// ```
    /// use beepy_loader::PackageManifest;
    ///
    /// let m = PackageManifest::parse("from beepy import tags, children\n", "beepy");
    /// assert_eq!(m.exports, vec!["tags", "children"]);
    /// ```
    pub fn parse(source: &str, package: &str) -> Self {
        let mut exports: Vec<String> = Vec::new();

        for line in source.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some(rest) = line.strip_prefix("from ") else {
                continue;
            };
            let Some((from, names)) = rest.split_once(" import ") else {
                continue;
            };
            if from.trim() != package {
                continue;
            }

            let names = names.trim().trim_start_matches('(').trim_end_matches(')');
            for name in names.split(',') {
                let name = name.split_whitespace().next().unwrap_or("");
                if is_identifier(name) && !exports.iter().any(|n| n == name) {
                    exports.push(name.to_string());
                }
            }
        }

        Self {
            package: package.to_string(),
            exports,
        }
    }

    /// Source files of the exported modules, relative to the package dir
    pub fn module_files(&self) -> Vec<String> {
        self.exports
            .iter()
            .map(|name| format!("{}.{}", name, SOURCE_EXT))
            .collect()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}
