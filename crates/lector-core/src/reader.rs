//! The reader: a preprocessing pipeline, a trainable model, and a
//! postprocessing pipeline behind one lifecycle.
//!
//! A reader is constructed from shared resources plus its three modules,
//! then either set up from a training set or restored from a reader
//! directory on disk.

use lector_abstraction::{
    Answer, InputModule, ModelModule, OutputModule, QASetting, ReaderError, ReaderResult,
    SharedResources, TrainingInstance,
};
use std::fs;
use std::path::Path;
use tracing::info;

/// File holding the configuration inside a reader directory; the
/// vocabulary files sit next to it.
pub const SHARED_RESOURCES_FILE: &str = "shared_resources.json";

/// File holding the model parameters inside a reader directory.
pub const MODEL_FILE: &str = "model.json";

pub struct Reader {
    shared: SharedResources,
    input: Box<dyn InputModule>,
    model: Box<dyn ModelModule>,
    output: Box<dyn OutputModule>,
    is_setup: bool,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("shared", &self.shared)
            .field("is_setup", &self.is_setup)
            .finish_non_exhaustive()
    }
}

impl Reader {
    #[must_use]
    pub fn new(
        shared: SharedResources,
        input: Box<dyn InputModule>,
        model: Box<dyn ModelModule>,
        output: Box<dyn OutputModule>,
    ) -> Self {
        Self { shared, input, model, output, is_setup: false }
    }

    #[must_use]
    pub fn shared(&self) -> &SharedResources {
        &self.shared
    }

    /// Mutable configuration access, for runtime overrides like `top_k`.
    pub fn config_mut(&mut self) -> &mut lector_abstraction::ReaderConfig {
        &mut self.shared.config
    }

    #[must_use]
    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    /// Initializes vocabulary and trainable parameters from a training
    /// set. Must be called exactly once on a fresh reader.
    pub fn setup_from_data(&mut self, data: &[TrainingInstance]) -> ReaderResult<()> {
        if self.is_setup {
            return Err(ReaderError::Model("reader is already set up".to_string()));
        }
        if data.is_empty() {
            return Err(ReaderError::Corpus("training set is empty".to_string()));
        }
        self.input.setup_from_data(&mut self.shared, data)?;
        self.model.setup(&self.shared)?;
        self.is_setup = true;
        info!(vocab = self.shared.vocab.len(), instances = data.len(), "reader set up from data");
        Ok(())
    }

    /// One training update over a slice of instances. Returns the batch
    /// loss. Used by the training driver.
    pub fn train_step(&mut self, batch: &[TrainingInstance]) -> ReaderResult<f64> {
        self.ensure_setup()?;
        let encoded = self.input.encode_with_answers(&self.shared, batch)?;
        self.model.train_step(&encoded)
    }

    /// Answers one batch of settings: encode, predict, decode.
    pub fn answers(&self, settings: &[QASetting]) -> ReaderResult<Vec<Vec<Answer>>> {
        self.ensure_setup()?;
        let batch = self.input.encode(&self.shared, settings)?;
        let predictions = self.model.predict(&batch)?;
        self.output.decode(&self.shared, settings, &predictions)
    }

    /// Lazily answers `settings`, one `batch_size` chunk at a time.
    /// Yields one answer vector per setting, in input order.
    pub fn answers_iter<'a>(
        &'a self,
        settings: &'a [QASetting],
        batch_size: usize,
    ) -> impl Iterator<Item = ReaderResult<Vec<Answer>>> + 'a {
        let batch_size = batch_size.max(1);
        settings.chunks(batch_size).flat_map(move |chunk| match self.answers(chunk) {
            Ok(answers) => answers.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(e)],
        })
    }

    /// Persists shared resources and model parameters into `dir`.
    pub fn store(&self, dir: &Path) -> ReaderResult<()> {
        self.ensure_setup()?;
        fs::create_dir_all(dir)?;
        self.shared.store(&dir.join(SHARED_RESOURCES_FILE))?;
        self.model.store(&dir.join(MODEL_FILE))?;
        info!(dir = %dir.display(), "stored reader");
        Ok(())
    }

    /// Restores shared resources and parameters from a reader directory
    /// written by [`store`](Self::store). Missing files fail fast.
    pub fn load(&mut self, dir: &Path) -> ReaderResult<()> {
        self.shared = SharedResources::load(&dir.join(SHARED_RESOURCES_FILE))?;
        self.input.setup(&self.shared)?;
        self.model.setup(&self.shared)?;
        self.model.load(&dir.join(MODEL_FILE))?;
        self.is_setup = true;
        info!(dir = %dir.display(), "loaded reader");
        Ok(())
    }

    fn ensure_setup(&self) -> ReaderResult<()> {
        if self.is_setup {
            Ok(())
        } else {
            Err(ReaderError::Model(
                "reader is not set up; call setup_from_data or load first".to_string(),
            ))
        }
    }
}
