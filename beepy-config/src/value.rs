//! Untyped configuration values and deep merge

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar configuration leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// Configuration value: a scalar, a list or a record
///
/// Deserializes from any JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Scalar(Scalar),
    List(Vec<ConfigValue>),
    Record(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Shorthand for a string scalar
    pub fn string(value: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::String(value.into()))
    }

    /// Build a record from key/value pairs
    pub fn record<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, ConfigValue)>,
        K: Into<String>,
    {
        ConfigValue::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a key if this is a record
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Record(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Get the string if this is a string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Deep merge `overlay` into `self`
    ///
    /// - list + list: concatenated, base items first
    /// - record + record: merged key by key, recursively
    /// - anything else: the overlay wins
    pub fn merge(self, overlay: ConfigValue) -> ConfigValue {
        match (self, overlay) {
            (ConfigValue::List(mut base), ConfigValue::List(extra)) => {
                base.extend(extra);
                ConfigValue::List(base)
            }
            (ConfigValue::Record(mut base), ConfigValue::Record(extra)) => {
                for (key, value) in extra {
                    let merged = match base.remove(&key) {
                        Some(existing) => existing.merge(value),
                        None => value,
                    };
                    base.insert(key, merged);
                }
                ConfigValue::Record(base)
            }
            (_, overlay) => overlay,
        }
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ConfigValue::Scalar(Scalar::Null),
            Value::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ConfigValue::Scalar(Scalar::Number(n)),
            Value::String(s) => ConfigValue::Scalar(Scalar::String(s)),
            Value::Array(items) => ConfigValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(fields) => {
                ConfigValue::Record(fields.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
