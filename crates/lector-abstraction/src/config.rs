use crate::error::{ReaderError, ReaderResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Free-form reader configuration.
///
/// Keys are reader-specific (`repr_dim`, `embedding_file`, ...) and never
/// validated centrally; components pull out the keys they understand via
/// the typed accessors. Merging is child-over-parent, which is how layered
/// configuration files compose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReaderConfig {
    values: serde_json::Map<String, Value>,
}

impl ReaderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.values.get(key).and_then(Value::as_u64).map(|v| v as usize)
    }

    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_str(key).map(PathBuf::from)
    }

    /// String value for a key that must be present.
    pub fn require_str(&self, key: &str) -> ReaderResult<&str> {
        self.get_str(key)
            .ok_or_else(|| ReaderError::Config(format!("missing config key `{key}`")))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Overlays `other` on top of `self`: keys in `other` win.
    pub fn merge(&mut self, other: &ReaderConfig) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
