use crate::error::{TrainingError, TrainingResult};
use crate::job::TrainingJobId;
use chrono::{DateTime, Utc};
use lector_abstraction::TrainingInstance;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Stable identifier for a training corpus (content hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorpusId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Checkpoint,
    SharedResources,
    Vocabulary,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrainingMetrics {
    /// Mean batch loss per epoch, in epoch order.
    pub epoch_losses: Vec<f64>,
    pub exact_match: Option<f64>,
    pub f1: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingManifest {
    pub job_id: TrainingJobId,
    pub created_at: DateTime<Utc>,
    pub reader: String,
    pub corpus_id: CorpusId,
    #[serde(default)]
    pub metrics: TrainingMetrics,
    pub artifacts: Vec<TrainingArtifact>,
}

pub fn compute_corpus_id(instances: &[TrainingInstance]) -> TrainingResult<CorpusId> {
    let mut hasher = Sha256::new();
    for instance in instances {
        hasher.update(serde_json::to_vec(instance)?);
        hasher.update(b"\n");
    }
    Ok(CorpusId(hex::encode(hasher.finalize())))
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_artifact(kind: ArtifactKind, path: PathBuf) -> TrainingResult<TrainingArtifact> {
    if !path.exists() {
        return Err(TrainingError::Trainer(format!(
            "artifact path does not exist: {}",
            path.display()
        )));
    }
    let hash = sha256_file(&path)?;
    Ok(TrainingArtifact { kind, path, sha256: hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lector_abstraction::{Answer, QASetting};

    fn instances() -> Vec<TrainingInstance> {
        vec![TrainingInstance {
            setting: QASetting::new("q?", vec!["support".to_string()]),
            answers: vec![Answer::new("support")],
        }]
    }

    #[test]
    fn test_corpus_id_stable_for_same_content() {
        let a = compute_corpus_id(&instances()).unwrap();
        let b = compute_corpus_id(&instances()).unwrap();
        assert_eq!(a, b);

        let mut changed = instances();
        changed[0].setting.question = "other?".to_string();
        assert_ne!(a, compute_corpus_id(&changed).unwrap());
    }

    #[test]
    fn test_make_artifact_requires_existing_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("checkpoint.json");
        assert!(make_artifact(ArtifactKind::Checkpoint, path.clone()).is_err());

        std::fs::write(&path, "{}").unwrap();
        let artifact = make_artifact(ArtifactKind::Checkpoint, path).unwrap();
        assert_eq!(artifact.sha256.len(), 64);
    }
}
