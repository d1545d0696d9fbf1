//! The three pipeline seams a reader is assembled from.
//!
//! An input module turns questions into port values, a model module
//! turns port values into predictions (and updates its parameters
//! during training), and an output module turns predictions back into
//! answers. Shared resources are owned by the reader and borrowed into
//! every call, so modules hold no aliased state.

use crate::data::{Answer, QASetting, TrainingInstance};
use crate::error::ReaderResult;
use crate::ports::{Batch, Port};
use crate::shared::SharedResources;
use std::path::Path;

/// Turns question settings into encoded batches.
pub trait InputModule: Send {
    /// Ports this module produces when encoding for prediction.
    fn output_ports(&self) -> &[Port];

    /// Builds vocabularies and any derived state from a training set.
    /// Called once, before training; the vocabulary is frozen afterwards.
    fn setup_from_data(
        &mut self,
        shared: &mut SharedResources,
        data: &[TrainingInstance],
    ) -> ReaderResult<()>;

    /// Re-derives internal state from restored shared resources.
    fn setup(&mut self, shared: &SharedResources) -> ReaderResult<()>;

    /// Encodes settings for prediction.
    fn encode(&self, shared: &SharedResources, settings: &[QASetting]) -> ReaderResult<Batch>;

    /// Encodes labeled instances for training, including gold ports.
    fn encode_with_answers(
        &self,
        shared: &SharedResources,
        data: &[TrainingInstance],
    ) -> ReaderResult<Batch>;
}

/// The trainable stage. Parameters live here and nowhere else.
pub trait ModelModule: Send {
    fn input_ports(&self) -> &[Port];

    fn output_ports(&self) -> &[Port];

    /// Sizes parameter tables against the (frozen) vocabularies.
    fn setup(&mut self, shared: &SharedResources) -> ReaderResult<()>;

    /// One parameter update from a training batch. Returns the batch
    /// loss under the parameters *before* the update.
    fn train_step(&mut self, batch: &Batch) -> ReaderResult<f64>;

    /// Scores a batch. Implementations pass through the input ports the
    /// output module needs for decoding (spans, offsets, candidates).
    fn predict(&self, batch: &Batch) -> ReaderResult<Batch>;

    /// Persists parameter values to `path`.
    fn store(&self, path: &Path) -> ReaderResult<()>;

    /// Restores parameter values from `path`. Fails if the checkpoint
    /// is missing or disagrees with the vocabulary the module was set
    /// up against.
    fn load(&mut self, path: &Path) -> ReaderResult<()>;
}

/// Turns model predictions back into answers.
pub trait OutputModule: Send {
    fn input_ports(&self) -> &[Port];

    /// Produces scored answers per instance, best first.
    fn decode(
        &self,
        shared: &SharedResources,
        settings: &[QASetting],
        predictions: &Batch,
    ) -> ReaderResult<Vec<Vec<Answer>>>;
}
