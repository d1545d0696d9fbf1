//! Reader abstraction layer for Lector.
//!
//! This crate defines the core traits and types shared by every reader:
//! the question/answer data structures, the vocabulary, the free-form
//! reader configuration, the shared-resources bundle handed to all
//! pipeline stages, and the three module traits (input, model, output)
//! that a reader is assembled from.

pub mod config;
pub mod data;
pub mod error;
pub mod module;
pub mod ports;
pub mod shared;
pub mod vocab;

pub use config::ReaderConfig;
pub use data::{Answer, AnswerSpan, QASetting, TrainingInstance};
pub use error::{ReaderError, ReaderResult};
pub use module::{InputModule, ModelModule, OutputModule};
pub use ports::{Batch, Port, TensorValue, TokenSpan};
pub use shared::{SharedResources, answer_vocab_path, vocab_path};
pub use vocab::{UNK_ID, UNK_TOKEN, Vocab};
