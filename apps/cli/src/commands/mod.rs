pub mod answer;
pub mod eval;
pub mod readers;
pub mod train;

use anyhow::Result;
use lector_abstraction::TrainingInstance;
use std::path::Path;

/// Loads a corpus file, or every `*.json` file when given a directory.
pub fn load_corpus_any(path: &Path) -> Result<Vec<TrainingInstance>> {
    let instances = if path.is_dir() {
        lector_core::load_corpus_dir(path)?
    } else {
        lector_core::load_corpus(path)?
    };
    Ok(instances)
}
