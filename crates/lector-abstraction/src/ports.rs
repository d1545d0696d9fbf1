//! Ports define module signatures.
//!
//! Reader modules are loosely coupled: each declares which ports it
//! consumes and produces, and a [`Batch`] carries the values between
//! them. This keeps input, model, and output stages freely combinable
//! as long as their signatures line up.

use crate::error::{ReaderError, ReaderResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named slot in a module signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port {
    pub name: &'static str,
    pub doc: &'static str,
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A span addressed in tokens or characters, tied to one support passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    /// Support passage index.
    pub doc: usize,
    pub start: usize,
    pub end: usize,
}

/// Values a port can carry. One outer `Vec` level is always the batch
/// dimension; inner lengths vary per instance.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValue {
    IdMatrix(Vec<Vec<u32>>),
    FloatMatrix(Vec<Vec<f32>>),
    Spans(Vec<Vec<TokenSpan>>),
    /// Per-instance optional index, e.g. the gold candidate position.
    Indices(Vec<Option<usize>>),
}

/// A mapping from ports to values for one batch of instances.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    values: HashMap<Port, TensorValue>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port: Port, value: TensorValue) {
        self.values.insert(port, value);
    }

    #[must_use]
    pub fn get(&self, port: Port) -> Option<&TensorValue> {
        self.values.get(&port)
    }

    #[must_use]
    pub fn contains(&self, port: Port) -> bool {
        self.values.contains_key(&port)
    }

    pub fn id_matrix(&self, port: Port) -> ReaderResult<&[Vec<u32>]> {
        match self.values.get(&port) {
            Some(TensorValue::IdMatrix(m)) => Ok(m),
            _ => Err(missing(port, "an id matrix")),
        }
    }

    pub fn float_matrix(&self, port: Port) -> ReaderResult<&[Vec<f32>]> {
        match self.values.get(&port) {
            Some(TensorValue::FloatMatrix(m)) => Ok(m),
            _ => Err(missing(port, "a float matrix")),
        }
    }

    pub fn spans(&self, port: Port) -> ReaderResult<&[Vec<TokenSpan>]> {
        match self.values.get(&port) {
            Some(TensorValue::Spans(s)) => Ok(s),
            _ => Err(missing(port, "spans")),
        }
    }

    pub fn indices(&self, port: Port) -> ReaderResult<&[Option<usize>]> {
        match self.values.get(&port) {
            Some(TensorValue::Indices(i)) => Ok(i),
            _ => Err(missing(port, "indices")),
        }
    }
}

fn missing(port: Port, expected: &str) -> ReaderError {
    ReaderError::Port(format!("port `{port}` missing or not {expected}"))
}

/// The standard ports understood by the built-in readers.
pub mod standard {
    use super::Port;

    pub const QUESTION_IDS: Port = Port {
        name: "question_ids",
        doc: "Token ids of the question, one row per instance.",
    };

    pub const SUPPORT_IDS: Port = Port {
        name: "support_ids",
        doc: "Token ids of all support passages of an instance, concatenated.",
    };

    pub const TOKEN_OFFSETS: Port = Port {
        name: "support_token_offsets",
        doc: "Per support token: passage index and character range, aligned with support_ids.",
    };

    pub const CANDIDATE_SPANS: Port = Port {
        name: "candidate_spans",
        doc: "Answer-candidate token spans indexing into support_ids rows.",
    };

    pub const CANDIDATE_IDS: Port = Port {
        name: "candidate_ids",
        doc: "Answer-vocabulary ids of the candidates of each instance.",
    };

    pub const GOLD_CANDIDATE: Port = Port {
        name: "gold_candidate",
        doc: "Index of the gold candidate per instance, if one matched.",
    };

    pub const SPAN_SCORES: Port = Port {
        name: "span_scores",
        doc: "Model score per candidate span, aligned with candidate_spans.",
    };

    pub const CANDIDATE_SCORES: Port = Port {
        name: "candidate_scores",
        doc: "Model score per candidate, aligned with candidate_ids.",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_typed_access() {
        let mut batch = Batch::new();
        batch.insert(standard::QUESTION_IDS, TensorValue::IdMatrix(vec![vec![1, 2]]));

        assert_eq!(batch.id_matrix(standard::QUESTION_IDS).unwrap()[0], vec![1, 2]);
        assert!(batch.id_matrix(standard::SUPPORT_IDS).is_err());
        // Wrong shape for the stored port is an error too.
        assert!(batch.float_matrix(standard::QUESTION_IDS).is_err());
    }

    #[test]
    fn test_port_display() {
        assert_eq!(standard::SPAN_SCORES.to_string(), "span_scores");
    }
}
