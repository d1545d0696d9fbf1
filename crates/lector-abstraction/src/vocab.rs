use crate::error::{ReaderError, ReaderResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token reserved for out-of-vocabulary symbols, always at id 0.
pub const UNK_TOKEN: &str = "<UNK>";
pub const UNK_ID: u32 = 0;

/// Bidirectional token/id mapping.
///
/// Ids are assigned densely in observation order, starting after the
/// reserved `<UNK>` entry. Once frozen, unknown tokens map to [`UNK_ID`]
/// instead of growing the vocabulary; embedding-backed vocabularies are
/// always frozen so ids stay aligned with matrix rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "VocabData", from = "VocabData")]
pub struct Vocab {
    tokens: Vec<String>,
    index: HashMap<String, u32>,
    frozen: bool,
}

impl Vocab {
    #[must_use]
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(UNK_TOKEN.to_string(), UNK_ID);
        Self { tokens: vec![UNK_TOKEN.to_string()], index, frozen: false }
    }

    /// Returns the id for `token`, assigning the next free id on first
    /// sight. On a frozen vocabulary unknown tokens map to [`UNK_ID`].
    pub fn observe(&mut self, token: &str) -> u32 {
        if let Some(&id) = self.index.get(token) {
            return id;
        }
        if self.frozen {
            return UNK_ID;
        }
        let id = self.tokens.len() as u32;
        self.tokens.push(token.to_string());
        self.index.insert(token.to_string(), id);
        id
    }

    /// Id for a known token, `None` otherwise. Never grows the vocabulary.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    /// Reverse lookup. Fails on an out-of-range id.
    pub fn token(&self, id: u32) -> ReaderResult<&str> {
        self.tokens.get(id as usize).map(String::as_str).ok_or_else(|| {
            ReaderError::Vocab(format!("id {id} out of range (vocabulary size {})", self.len()))
        })
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        // The reserved <UNK> entry is always present.
        self.tokens.len() <= 1
    }

    /// Tokens in id order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk form: the id-ordered token list plus the frozen flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabData {
    tokens: Vec<String>,
    frozen: bool,
}

impl From<Vocab> for VocabData {
    fn from(vocab: Vocab) -> Self {
        Self { tokens: vocab.tokens, frozen: vocab.frozen }
    }
}

impl From<VocabData> for Vocab {
    fn from(data: VocabData) -> Self {
        let mut index = HashMap::with_capacity(data.tokens.len());
        for (id, token) in data.tokens.iter().enumerate() {
            // First occurrence wins, matching observation order.
            index.entry(token.clone()).or_insert(id as u32);
        }
        Self { tokens: data.tokens, index, frozen: data.frozen }
    }
}
