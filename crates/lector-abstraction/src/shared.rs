use crate::config::ReaderConfig;
use crate::error::{ReaderError, ReaderResult};
use crate::vocab::Vocab;
use std::fs;
use std::path::{Path, PathBuf};

/// Shared resources between reader modules.
///
/// The bundle of stateful information all pipeline stages of a reader
/// operate on: the vocabulary, the free-form configuration, and, for
/// multiple-choice readers, a separate answer vocabulary. A stored
/// reader is re-created from this bundle.
#[derive(Debug, Clone, Default)]
pub struct SharedResources {
    pub config: ReaderConfig,
    pub vocab: Vocab,
    /// Separate vocabulary over answer candidates. `None` for readers
    /// that share the token vocabulary or produce spans.
    pub answer_vocab: Option<Vocab>,
}

impl SharedResources {
    #[must_use]
    pub fn new(config: ReaderConfig) -> Self {
        Self { config, vocab: Vocab::new(), answer_vocab: None }
    }

    /// Saves the configuration to `path` and the vocabularies to
    /// sibling files derived from its stem.
    pub fn store(&self, path: &Path) -> ReaderResult<()> {
        fs::write(path, serde_json::to_string_pretty(&self.config)?)?;
        fs::write(vocab_path(path), serde_json::to_string_pretty(&self.vocab)?)?;
        if let Some(answer_vocab) = &self.answer_vocab {
            fs::write(answer_vocab_path(path), serde_json::to_string_pretty(answer_vocab)?)?;
        }
        Ok(())
    }

    /// Restores a bundle previously written with [`store`](Self::store).
    /// Missing files fail fast.
    pub fn load(path: &Path) -> ReaderResult<Self> {
        let config_text = fs::read_to_string(path).map_err(|e| {
            ReaderError::Config(format!("shared resources not found at {}: {e}", path.display()))
        })?;
        let config: ReaderConfig = serde_json::from_str(&config_text)?;

        let vocab_file = vocab_path(path);
        let vocab_text = fs::read_to_string(&vocab_file).map_err(|e| {
            ReaderError::Vocab(format!(
                "shared vocabulary not found at {}: {e}",
                vocab_file.display()
            ))
        })?;
        let vocab: Vocab = serde_json::from_str(&vocab_text)?;

        let answer_file = answer_vocab_path(path);
        let answer_vocab = if answer_file.exists() {
            Some(serde_json::from_str(&fs::read_to_string(&answer_file)?)?)
        } else {
            None
        };

        Ok(Self { config, vocab, answer_vocab })
    }
}

/// Path of the vocabulary file stored next to a shared-resources file.
#[must_use]
pub fn vocab_path(shared_path: &Path) -> PathBuf {
    companion(shared_path, "_vocab")
}

/// Path of the answer-vocabulary file stored next to a shared-resources file.
#[must_use]
pub fn answer_vocab_path(shared_path: &Path) -> PathBuf {
    companion(shared_path, "_answer_vocab")
}

fn companion(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("shared_resources");
    path.with_file_name(format!("{stem}{suffix}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_companion_paths() {
        let path = Path::new("/tmp/reader/shared_resources.json");
        assert_eq!(
            vocab_path(path),
            Path::new("/tmp/reader/shared_resources_vocab.json")
        );
        assert_eq!(
            answer_vocab_path(path),
            Path::new("/tmp/reader/shared_resources_answer_vocab.json")
        );
    }

    #[test]
    fn test_store_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("shared_resources.json");

        let mut config = ReaderConfig::new();
        config.set("reader", "lexical_span");
        let mut shared = SharedResources::new(config);
        shared.vocab.observe("ada");
        shared.vocab.observe("babbage");
        shared.vocab.freeze();

        shared.store(&path).unwrap();
        let back = SharedResources::load(&path).unwrap();

        assert_eq!(back.config.get_str("reader"), Some("lexical_span"));
        assert_eq!(back.vocab.get("ada"), shared.vocab.get("ada"));
        assert_eq!(back.vocab.len(), shared.vocab.len());
        assert!(back.vocab.is_frozen());
        assert!(back.answer_vocab.is_none());
    }

    #[test]
    fn test_answer_vocab_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("shared_resources.json");

        let mut shared = SharedResources::new(ReaderConfig::new());
        let mut answer_vocab = Vocab::new();
        answer_vocab.observe("entailment");
        answer_vocab.observe("contradiction");
        answer_vocab.freeze();
        shared.answer_vocab = Some(answer_vocab);

        shared.store(&path).unwrap();
        let back = SharedResources::load(&path).unwrap();
        let loaded = back.answer_vocab.expect("answer vocab restored");
        assert_eq!(loaded.get("entailment"), Some(1));
    }

    #[test]
    fn test_load_missing_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.json");
        assert!(SharedResources::load(&missing).is_err());
    }
}
