//! Built-in readers and the reader registry.
//!
//! Two readers ship with the framework, both count-table models:
//! - `lexical_span`: extractive question answering over support spans
//! - `lexical_mc`: multiple-choice / entailment over answer candidates
//!
//! Readers are constructed by name through [`ReaderRegistry`], which is
//! also how stored readers are restored from disk.

mod common;
pub mod lexical_mc;
pub mod lexical_span;
pub mod registry;

pub use registry::{ReaderFactory, ReaderRegistry, default_registry};
