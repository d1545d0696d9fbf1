//! Reader registry: constructing readers by name.

use crate::{lexical_mc, lexical_span};
use lector_abstraction::{ReaderError, ReaderResult, SharedResources};
use lector_core::{Reader, SHARED_RESOURCES_FILE};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Builds a reader from shared resources. The configuration inside the
/// shared resources is where a factory picks up its options.
pub type ReaderFactory = fn(SharedResources) -> ReaderResult<Reader>;

/// Maps reader names to factories.
pub struct ReaderRegistry {
    factories: BTreeMap<String, ReaderFactory>,
}

impl ReaderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { factories: BTreeMap::new() }
    }

    /// A registry with the built-in readers pre-registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("lexical_span", lexical_span::reader_factory);
        registry.register("lexical_mc", lexical_mc::reader_factory);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ReaderFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiates a reader by name. The name is recorded in the
    /// shared configuration so stored readers can be restored.
    pub fn create(&self, name: &str, mut shared: SharedResources) -> ReaderResult<Reader> {
        let factory = self.factories.get(name).ok_or_else(|| {
            ReaderError::UnknownReader(format!("{name} (known: {})", self.names().join(", ")))
        })?;
        shared.config.set("reader", name);
        debug!(reader = name, "creating reader");
        factory(shared)
    }

    /// Restores a stored reader: reads the shared resources from `dir`,
    /// constructs the reader named in its configuration, and loads the
    /// parameters.
    pub fn load(&self, dir: &Path) -> ReaderResult<Reader> {
        let shared = SharedResources::load(&dir.join(SHARED_RESOURCES_FILE))?;
        let name = shared.config.require_str("reader")?.to_string();
        let mut reader = self.create(&name, shared)?;
        reader.load(dir)?;
        Ok(reader)
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// The process-wide registry holding the built-in readers.
pub fn default_registry() -> &'static ReaderRegistry {
    static REGISTRY: Lazy<ReaderRegistry> = Lazy::new(ReaderRegistry::with_builtins);
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use lector_abstraction::{Answer, AnswerSpan, QASetting, ReaderConfig, TrainingInstance};
    use tempfile::TempDir;

    fn span_corpus() -> Vec<TrainingInstance> {
        vec![TrainingInstance {
            setting: QASetting::new(
                "Who wrote the first program?",
                vec!["Ada Lovelace wrote the first program.".to_string()],
            ),
            answers: vec![
                Answer::new("Ada Lovelace").with_span(AnswerSpan { start: 0, end: 12, doc_idx: 0 }),
            ],
        }]
    }

    #[test]
    fn test_builtins_registered() {
        let names = default_registry().names();
        assert_eq!(names, vec!["lexical_mc", "lexical_span"]);
    }

    #[test]
    fn test_create_records_reader_name() {
        let reader = default_registry()
            .create("lexical_span", SharedResources::new(ReaderConfig::new()))
            .unwrap();
        assert_eq!(reader.shared().config.get_str("reader"), Some("lexical_span"));
    }

    #[test]
    fn test_unknown_reader_lists_known() {
        let err = default_registry()
            .create("fastqa", SharedResources::new(ReaderConfig::new()))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("fastqa"));
        assert!(message.contains("lexical_span"));
    }

    #[test]
    fn test_load_and_setup_from_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("reader");
        let data = span_corpus();

        let mut reader = default_registry()
            .create("lexical_span", SharedResources::new(ReaderConfig::new()))
            .unwrap();
        reader.setup_from_data(&data).unwrap();
        reader.train_step(&data).unwrap();
        let before = reader.answers(&[data[0].setting.clone()]).unwrap();
        reader.store(&dir).unwrap();

        let restored = default_registry().load(&dir).unwrap();
        assert!(restored.is_setup());
        let after = restored.answers(&[data[0].setting.clone()]).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        assert!(default_registry().load(&temp.path().join("absent")).is_err());
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ReaderRegistry::new();
        registry.register("span_again", lexical_span::reader_factory);
        assert_eq!(registry.names(), vec!["span_again"]);
        assert!(registry
            .create("span_again", SharedResources::new(ReaderConfig::new()))
            .is_ok());
    }
}
