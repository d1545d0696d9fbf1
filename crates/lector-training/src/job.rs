use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Identifier for a training job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainingJobId(pub String);

impl TrainingJobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TrainingJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrainingJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingHyperParams {
    pub seed: u64,
    pub epochs: u32,
    pub batch_size: u32,
}

impl Default for TrainingHyperParams {
    fn default() -> Self {
        Self { seed: 42, epochs: 5, batch_size: 32 }
    }
}

impl TrainingHyperParams {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.epochs == 0 {
            return Err(TrainingError::InvalidSpec("epochs must be >= 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::InvalidSpec("batch_size must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// What to train: a registered reader over a corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingJobSpec {
    pub job_id: TrainingJobId,
    pub created_at: DateTime<Utc>,
    /// Registered reader name, e.g. `lexical_span`.
    pub reader: String,
    pub train_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_path: Option<PathBuf>,
    pub hyperparams: TrainingHyperParams,
}

impl TrainingJobSpec {
    #[must_use]
    pub fn new(reader: impl Into<String>, train_path: PathBuf) -> Self {
        Self {
            job_id: TrainingJobId::new(),
            created_at: Utc::now(),
            reader: reader.into(),
            train_path,
            dev_path: None,
            hyperparams: TrainingHyperParams::default(),
        }
    }

    #[must_use]
    pub fn with_dev(mut self, dev_path: PathBuf) -> Self {
        self.dev_path = Some(dev_path);
        self
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.reader.trim().is_empty() {
            return Err(TrainingError::InvalidSpec("reader name is required".to_string()));
        }
        self.hyperparams.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validate_requires_reader() {
        let mut spec = TrainingJobSpec::new("", PathBuf::from("train.json"));
        assert!(spec.validate().is_err());
        spec.reader = "lexical_span".to_string();
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_hyperparams_validate() {
        let mut params = TrainingHyperParams::default();
        assert!(params.validate().is_ok());
        params.epochs = 0;
        assert!(params.validate().is_err());
        params.epochs = 1;
        params.batch_size = 0;
        assert!(params.validate().is_err());
    }
}
