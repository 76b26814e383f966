//! BeePy Config - Pure configuration data structures
//!
//! This crate contains only data structures, no IO or global state.
//! It serves as the shared configuration vocabulary across all loader crates.

use std::fmt;
use std::sync::Arc;

mod value;

pub use value::{ConfigValue, Scalar};

/// Default version of the embedded interpreter engine
pub const DEFAULT_RUNTIME_VERSION: &str = "0.25.1";

/// Framework version that selects the local development bundle
pub const DEV_FRAMEWORK_VERSION: &str = "dev";

/// Include file that is allowed to be missing
pub const ENV_FILE: &str = ".env";

/// CDN hosting the interpreter engine builds
pub const ENGINE_CDN: &str = "https://cdn.jsdelivr.net/pyodide";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("config key '{key}' must be {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("config root must be a record")]
    NotARecord,
}

/// Producer of a requirement list, invoked lazily at install time
pub type RequirementsProducer = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// User-declared requirements
#[derive(Clone)]
pub enum Requirements {
    /// Fixed list of package specifiers
    List(Vec<String>),
    /// List produced on demand
    Producer(RequirementsProducer),
}

impl Requirements {
    /// Get the requirement list, invoking the producer if needed
    pub fn resolve(&self) -> Vec<String> {
        match self {
            Requirements::List(list) => list.clone(),
            Requirements::Producer(produce) => produce(),
        }
    }
}

impl Default for Requirements {
    fn default() -> Self {
        Requirements::List(Vec::new())
    }
}

impl fmt::Debug for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirements::List(list) => f.debug_tuple("List").field(list).finish(),
            Requirements::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Interpreter engine version
    pub runtime_version: String,
    /// Packages installed before the application bundle
    pub requirements: Requirements,
    /// Files written into the virtual root before the entry point runs
    pub include_files: Vec<String>,
    /// Whether the dev reload channel is enabled
    pub development: bool,
    /// Framework bundle version ("dev" selects the local wheel)
    pub framework_version: String,
    /// Base path of the local development checkout
    pub dev_path: String,
    /// Page origin that relative network paths resolve against
    pub origin: String,
    /// Explicit root module (bypasses auto-discovery)
    pub entry_module: Option<String>,
    /// Base URL serving framework sources, used instead of the bundle
    pub framework_path: Option<String>,
    /// Query appended to every request URL in development mode
    pub dev_extra_query: Option<String>,
}

impl LoaderConfig {
    /// Index URL of the interpreter engine build
    pub fn engine_index_url(&self) -> String {
        format!("{}/v{}/full/", ENGINE_CDN, self.runtime_version)
    }

    /// Whether the local development bundle should be installed
    pub fn is_dev_framework(&self) -> bool {
        self.framework_version == DEV_FRAMEWORK_VERSION
    }

    /// Default configuration as an untyped value, used as the merge base
    pub fn default_value() -> ConfigValue {
        ConfigValue::record([
            ("runtimeVersion", ConfigValue::string(DEFAULT_RUNTIME_VERSION)),
            ("requirements", ConfigValue::List(Vec::new())),
            ("include", ConfigValue::List(vec![ConfigValue::string(ENV_FILE)])),
            ("development", ConfigValue::Scalar(Scalar::Bool(false))),
            ("frameworkVersion", ConfigValue::string(DEV_FRAMEWORK_VERSION)),
            ("devPath", ConfigValue::string("")),
            ("origin", ConfigValue::string("")),
        ])
    }

    /// Build a configuration from a user value merged over the defaults
    ///
    /// Lists are concatenated with the defaults, so user includes are
    /// loaded after `.env`.
    pub fn from_value(user: &ConfigValue) -> Result<Self, ConfigError> {
        if !matches!(user, ConfigValue::Record(_)) {
            return Err(ConfigError::NotARecord);
        }
        let merged = Self::default_value().merge(user.clone());

        let entry_module = optional_str(&merged, "entryModule")?;
        let framework_path = optional_str(&merged, "frameworkPath")?;
        let dev_extra_query = optional_str(&merged, "devExtraQuery")?;

        Ok(Self {
            runtime_version: require_str(&merged, "runtimeVersion")?,
            requirements: Requirements::List(require_str_list(&merged, "requirements")?),
            include_files: require_str_list(&merged, "include")?,
            development: require_bool(&merged, "development")?,
            framework_version: require_str(&merged, "frameworkVersion")?,
            dev_path: require_str(&merged, "devPath")?,
            origin: require_str(&merged, "origin")?,
            entry_module,
            framework_path,
            dev_extra_query,
        })
    }

    /// Request query for the file gateway, only honoured in development
    pub fn request_query(&self) -> Option<&str> {
        self.dev_extra_query
            .as_deref()
            .filter(|query| self.development && !query.is_empty())
    }

    /// Replace the requirement list with a lazy producer
    pub fn with_requirements_producer<F>(mut self, produce: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        self.requirements = Requirements::Producer(Arc::new(produce));
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            requirements: Requirements::default(),
            include_files: vec![ENV_FILE.to_string()],
            development: false,
            framework_version: DEV_FRAMEWORK_VERSION.to_string(),
            dev_path: String::new(),
            origin: String::new(),
            entry_module: None,
            framework_path: None,
            dev_extra_query: None,
        }
    }
}

fn expect_str<'a>(value: &'a ConfigValue, key: &str) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: "a string",
    })
}

fn require_str(record: &ConfigValue, key: &str) -> Result<String, ConfigError> {
    match record.get(key) {
        Some(value) => expect_str(value, key).map(str::to_string),
        None => Err(ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "a string",
        }),
    }
}

fn optional_str(record: &ConfigValue, key: &str) -> Result<Option<String>, ConfigError> {
    match record.get(key) {
        None | Some(ConfigValue::Scalar(Scalar::Null)) => Ok(None),
        Some(value) => expect_str(value, key).map(|s| Some(s.to_string())),
    }
}

fn require_bool(record: &ConfigValue, key: &str) -> Result<bool, ConfigError> {
    match record.get(key) {
        Some(ConfigValue::Scalar(Scalar::Bool(flag))) => Ok(*flag),
        _ => Err(ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "a boolean",
        }),
    }
}

fn require_str_list(record: &ConfigValue, key: &str) -> Result<Vec<String>, ConfigError> {
    let mismatch = || ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: "a list of strings",
    };
    match record.get(key) {
        Some(ConfigValue::List(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
            .collect(),
        _ => Err(mismatch()),
    }
}

/// Loader component, used as the log target for each layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Resolver,
    Gateway,
    Loader,
    Bootstrap,
    Reload,
}

impl Component {
    /// All components, in load order
    pub const ALL: [Component; 5] = [
        Component::Resolver,
        Component::Gateway,
        Component::Loader,
        Component::Bootstrap,
        Component::Reload,
    ];

    /// Get the string name of the component
    pub const fn as_str(&self) -> &'static str {
        match self {
            Component::Resolver => "resolver",
            Component::Gateway => "gateway",
            Component::Loader => "loader",
            Component::Bootstrap => "bootstrap",
            Component::Reload => "reload",
        }
    }

    /// Get the log target name for this component
    ///
    /// Usable in `const` items, so emitters and filters share one name.
    pub const fn target(&self) -> &'static str {
        match self {
            Component::Resolver => "beepy::resolver",
            Component::Gateway => "beepy::gateway",
            Component::Loader => "beepy::loader",
            Component::Bootstrap => "beepy::bootstrap",
            Component::Reload => "beepy::reload",
        }
    }
}
