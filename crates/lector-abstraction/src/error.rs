use thiserror::Error;

pub type ReaderResult<T> = std::result::Result<T, ReaderError>;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("vocabulary error: {0}")]
    Vocab(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("corpus error: {0}")]
    Corpus(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("port error: {0}")]
    Port(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("unknown reader: {0}")]
    UnknownReader(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
