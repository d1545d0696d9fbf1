//! Parsers for pretrained embedding files.
//!
//! Two text formats are supported: GloVe (one `token v1 .. vd` row per
//! line) and word2vec text (the same rows behind a `count dim` header).
//! Files ending in `.gz` are decompressed on the fly.

use flate2::read::GzDecoder;
use lector_abstraction::{ReaderError, ReaderResult, UNK_ID, Vocab};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingFormat {
    Glove,
    Word2VecText,
}

impl FromStr for EmbeddingFormat {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "glove" => Ok(Self::Glove),
            "word2vec" | "word2vec_text" => Ok(Self::Word2VecText),
            other => Err(ReaderError::Embedding(format!(
                "unknown embedding format `{other}` (expected glove or word2vec)"
            ))),
        }
    }
}

/// A dense embedding matrix with its row-aligned, frozen vocabulary.
///
/// Row 0 belongs to the reserved `<UNK>` token and is all zeros.
#[derive(Debug, Clone)]
pub struct Embeddings {
    vocab: Vocab,
    matrix: Vec<f32>,
    dim: usize,
}

impl Embeddings {
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows, including the `<UNK>` row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    #[must_use]
    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Consumes the table, keeping only the vocabulary.
    #[must_use]
    pub fn into_vocab(self) -> Vocab {
        self.vocab
    }

    #[must_use]
    pub fn row(&self, id: u32) -> Option<&[f32]> {
        let start = id as usize * self.dim;
        self.matrix.get(start..start + self.dim)
    }

    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<&[f32]> {
        self.vocab.get(token).and_then(|id| self.row(id))
    }
}

/// Parses an embedding file into a matrix plus vocabulary.
///
/// Fails on malformed rows, on a dimension change between rows, and,
/// for word2vec, on a body disagreeing with the header.
pub fn load_embeddings(path: &Path, format: EmbeddingFormat) -> ReaderResult<Embeddings> {
    let file = File::open(path).map_err(|e| {
        ReaderError::Embedding(format!("cannot open embedding file {}: {e}", path.display()))
    })?;
    let reader: Box<dyn BufRead> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    parse_embeddings(reader, format, path)
}

fn parse_embeddings(
    reader: Box<dyn BufRead>,
    format: EmbeddingFormat,
    path: &Path,
) -> ReaderResult<Embeddings> {
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    let declared = if format == EmbeddingFormat::Word2VecText {
        line_no += 1;
        let header = lines
            .next()
            .transpose()?
            .ok_or_else(|| ReaderError::Embedding(format!("{}: empty file", path.display())))?;
        Some(parse_header(&header, path)?)
    } else {
        None
    };

    let mut vocab = Vocab::new();
    let mut matrix: Vec<f32> = Vec::new();
    let mut dim = 0usize;
    let mut rows = 0usize;

    for line in lines {
        let line = line?;
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let token = parts.next().ok_or_else(|| malformed(path, line_no, "missing token"))?;
        let values: Vec<f32> = parts
            .map(|v| {
                v.parse::<f32>()
                    .map_err(|_| malformed(path, line_no, &format!("bad float `{v}`")))
            })
            .collect::<ReaderResult<_>>()?;

        if values.is_empty() {
            return Err(malformed(path, line_no, "row has no vector components"));
        }
        if dim == 0 {
            dim = values.len();
            if let Some((_, declared_dim)) = declared {
                if dim != declared_dim {
                    return Err(ReaderError::Embedding(format!(
                        "{}: header declares dimension {declared_dim} but rows have {dim}",
                        path.display()
                    )));
                }
            }
            // Reserved zero row for <UNK>, keeping ids row-aligned.
            matrix.extend(std::iter::repeat_n(0.0, dim));
        } else if values.len() != dim {
            return Err(malformed(
                path,
                line_no,
                &format!("dimension {} does not match {}", values.len(), dim),
            ));
        }

        if vocab.get(token).is_some() {
            warn!(token, line = line_no, "duplicate embedding token, keeping first");
            continue;
        }
        let id = vocab.observe(token);
        debug_assert_ne!(id, UNK_ID);
        matrix.extend(values);
        rows += 1;
    }

    if rows == 0 {
        return Err(ReaderError::Embedding(format!("{}: no embedding rows", path.display())));
    }
    if let Some((declared_count, _)) = declared {
        if rows != declared_count {
            return Err(ReaderError::Embedding(format!(
                "{}: header declares {declared_count} rows but file has {rows}",
                path.display()
            )));
        }
    }

    vocab.freeze();
    debug!(rows, dim, "loaded embeddings from {}", path.display());
    Ok(Embeddings { vocab, matrix, dim })
}

fn parse_header(header: &str, path: &Path) -> ReaderResult<(usize, usize)> {
    let mut parts = header.split_whitespace();
    let count = parts.next().and_then(|v| v.parse::<usize>().ok());
    let dim = parts.next().and_then(|v| v.parse::<usize>().ok());
    match (count, dim, parts.next()) {
        (Some(count), Some(dim), None) => Ok((count, dim)),
        _ => Err(ReaderError::Embedding(format!(
            "{}: malformed word2vec header `{header}`",
            path.display()
        ))),
    }
}

fn malformed(path: &Path, line: usize, detail: &str) -> ReaderError {
    ReaderError::Embedding(format!("{}:{line}: {detail}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_glove_parses_and_aligns() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "vectors.txt", "ada 1.0 2.0\nbabbage 3.0 4.0\n");

        let emb = load_embeddings(&path, EmbeddingFormat::Glove).unwrap();
        assert_eq!(emb.dim(), 2);
        assert_eq!(emb.len(), 3);
        assert!(emb.vocab().is_frozen());
        assert_eq!(emb.lookup("ada"), Some(&[1.0, 2.0][..]));
        assert_eq!(emb.row(UNK_ID), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn test_glove_dimension_mismatch_fails() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "vectors.txt", "ada 1.0 2.0\nbabbage 3.0\n");
        assert!(load_embeddings(&path, EmbeddingFormat::Glove).is_err());
    }

    #[test]
    fn test_glove_malformed_float_fails() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "vectors.txt", "ada 1.0 oops\n");
        assert!(load_embeddings(&path, EmbeddingFormat::Glove).is_err());
    }

    #[test]
    fn test_word2vec_header_checked() {
        let temp = TempDir::new().unwrap();
        let good = write_file(&temp, "good.txt", "2 2\nada 1.0 2.0\nbabbage 3.0 4.0\n");
        let emb = load_embeddings(&good, EmbeddingFormat::Word2VecText).unwrap();
        assert_eq!(emb.len(), 3);

        let short = write_file(&temp, "short.txt", "3 2\nada 1.0 2.0\n");
        assert!(load_embeddings(&short, EmbeddingFormat::Word2VecText).is_err());

        let wrong_dim = write_file(&temp, "dim.txt", "1 4\nada 1.0 2.0\n");
        assert!(load_embeddings(&wrong_dim, EmbeddingFormat::Word2VecText).is_err());
    }

    #[test]
    fn test_duplicate_token_keeps_first() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "vectors.txt", "ada 1.0\nada 9.0\n");
        let emb = load_embeddings(&path, EmbeddingFormat::Glove).unwrap();
        assert_eq!(emb.len(), 2);
        assert_eq!(emb.lookup("ada"), Some(&[1.0][..]));
    }

    #[test]
    fn test_gz_transparent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.txt.gz");
        let file = File::create(&path).unwrap();
        let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        gz.write_all(b"ada 1.0 2.0\n").unwrap();
        gz.finish().unwrap();

        let emb = load_embeddings(&path, EmbeddingFormat::Glove).unwrap();
        assert_eq!(emb.lookup("ada"), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("glove".parse::<EmbeddingFormat>().unwrap(), EmbeddingFormat::Glove);
        assert_eq!("Word2Vec".parse::<EmbeddingFormat>().unwrap(), EmbeddingFormat::Word2VecText);
        assert!("fasttext".parse::<EmbeddingFormat>().is_err());
    }
}
