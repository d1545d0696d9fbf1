//! Layered TOML configuration.
//!
//! A configuration file may name a `parent_config`; the parent is loaded
//! first (resolved relative to the child) and the child's keys override
//! it. Chains resolve recursively, cycles are rejected.

use lector_abstraction::{ReaderConfig, ReaderError, ReaderResult};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const PARENT_KEY: &str = "parent_config";

/// Loads a configuration file, resolving `parent_config` inheritance.
pub fn load_config(path: &Path) -> ReaderResult<ReaderConfig> {
    load_layered(path, &mut Vec::new())
}

fn load_layered(path: &Path, stack: &mut Vec<PathBuf>) -> ReaderResult<ReaderConfig> {
    let canonical = path.canonicalize().map_err(|e| {
        ReaderError::Config(format!("config file not found: {}: {e}", path.display()))
    })?;
    if stack.contains(&canonical) {
        return Err(ReaderError::Config(format!(
            "config inheritance cycle at {}",
            path.display()
        )));
    }
    stack.push(canonical.clone());

    let text = fs::read_to_string(&canonical)?;
    let table: toml::Table = text
        .parse()
        .map_err(|e| ReaderError::Config(format!("{}: {e}", path.display())))?;
    let mut config = ReaderConfig::new();
    for (key, value) in table {
        config.set(key, toml_to_json(value));
    }

    let config = match config.remove(PARENT_KEY) {
        Some(parent) => {
            let parent = parent.as_str().ok_or_else(|| {
                ReaderError::Config(format!(
                    "{}: `{PARENT_KEY}` must be a string path",
                    path.display()
                ))
            })?;
            let parent_path =
                canonical.parent().unwrap_or_else(|| Path::new(".")).join(parent);
            debug!(child = %path.display(), parent = %parent_path.display(), "layering config");
            let mut base = load_layered(&parent_path, stack)?;
            base.merge(&config);
            base
        }
        None => config,
    };

    stack.pop();
    Ok(config)
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => {
            serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
        }
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            Value::Array(items.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => Value::Object(
            table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_flat_config() {
        let temp = TempDir::new().unwrap();
        let path = write(
            &temp,
            "reader.toml",
            "reader = \"lexical_span\"\nseed = 42\nlowercase = true\n",
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.get_str("reader"), Some("lexical_span"));
        assert_eq!(config.get_u64("seed"), Some(42));
        assert_eq!(config.get_bool("lowercase"), Some(true));
    }

    #[test]
    fn test_parent_layering_child_wins() {
        let temp = TempDir::new().unwrap();
        write(&temp, "base.toml", "seed = 42\nepochs = 5\nbatch_size = 32\n");
        let child = write(
            &temp,
            "child.toml",
            "parent_config = \"base.toml\"\nepochs = 10\nreader = \"lexical_mc\"\n",
        );

        let config = load_config(&child).unwrap();
        assert_eq!(config.get_u64("seed"), Some(42));
        assert_eq!(config.get_usize("epochs"), Some(10));
        assert_eq!(config.get_str("reader"), Some("lexical_mc"));
        assert!(config.get("parent_config").is_none());
    }

    #[test]
    fn test_cycle_rejected() {
        let temp = TempDir::new().unwrap();
        write(&temp, "a.toml", "parent_config = \"b.toml\"\n");
        let a = temp.path().join("a.toml");
        write(&temp, "b.toml", "parent_config = \"a.toml\"\n");

        let err = load_config(&a).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_missing_and_malformed_fail() {
        let temp = TempDir::new().unwrap();
        assert!(load_config(&temp.path().join("nope.toml")).is_err());

        let bad = write(&temp, "bad.toml", "this is not toml [\n");
        assert!(load_config(&bad).is_err());
    }
}
