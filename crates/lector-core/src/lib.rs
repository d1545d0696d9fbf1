//! Lector Core
//!
//! The reader lifecycle and the data plumbing around it:
//! - Layered TOML configuration (`config`)
//! - QA corpus loading (`corpus`)
//! - Pretrained embedding parsing (`embeddings`)
//! - Tokenization (`text`)
//! - The `Reader` itself: setup, prediction, store/load (`reader`)
//! - Answer evaluation (`eval`)

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod eval;
pub mod reader;
pub mod text;

pub use config::load_config;
pub use corpus::{load_corpus, load_corpus_dir};
pub use embeddings::{EmbeddingFormat, Embeddings, load_embeddings};
pub use eval::{EvalSummary, evaluate, exact_match, f1_score, normalize_answer};
pub use reader::{MODEL_FILE, Reader, SHARED_RESOURCES_FILE};
pub use text::{Token, char_slice, tokenize};
