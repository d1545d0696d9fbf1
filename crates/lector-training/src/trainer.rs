use crate::artifacts::{
    ArtifactKind, TrainingManifest, TrainingMetrics, compute_corpus_id, make_artifact,
};
use crate::error::{TrainingError, TrainingResult};
use crate::hooks::{EpochSummary, TrainingHook};
use crate::job::{TrainingJobId, TrainingJobSpec};
use crate::layout::TrainingLayout;
use crate::progress::{ProgressEvent, ProgressSink};
use async_trait::async_trait;
use lector_abstraction::{TrainingInstance, vocab_path};
use lector_core::{MODEL_FILE, Reader, SHARED_RESOURCES_FILE, evaluate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerStatus {
    Idle,
    Preparing,
    Running,
    Finished,
    Failed(String),
    Cancelled,
}

/// A training backend for readers.
#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    async fn prepare(&self, job: &TrainingJobSpec) -> TrainingResult<()>;

    async fn run(
        &self,
        job: &TrainingJobSpec,
        reader: &mut Reader,
        train: &[TrainingInstance],
        dev: Option<&[TrainingInstance]>,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingManifest>;

    async fn status(&self, job_id: &TrainingJobId) -> TrainingResult<TrainerStatus>;

    async fn cancel(&self, job_id: &TrainingJobId) -> TrainingResult<()>;
}

/// The local trainer: shuffled batches, one pass per epoch, a reader
/// checkpoint after every epoch and a final reader directory, with a
/// manifest tying it all together.
pub struct EpochTrainer {
    workspace_root: PathBuf,
    hooks: Vec<Box<dyn TrainingHook>>,
    statuses: Arc<Mutex<HashMap<String, TrainerStatus>>>,
}

impl EpochTrainer {
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root, hooks: Vec::new(), statuses: Arc::new(Mutex::new(HashMap::new())) }
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Box<dyn TrainingHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    fn layout(&self) -> TrainingLayout {
        TrainingLayout::for_workspace_root(&self.workspace_root)
    }

    fn set_status(&self, job_id: &TrainingJobId, status: TrainerStatus) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(job_id.0.clone(), status);
        }
    }

    fn is_cancelled(&self, job_id: &TrainingJobId) -> bool {
        self.statuses
            .lock()
            .ok()
            .and_then(|s| s.get(&job_id.0).cloned())
            .is_some_and(|s| s == TrainerStatus::Cancelled)
    }
}

#[async_trait]
impl Trainer for EpochTrainer {
    fn id(&self) -> &'static str {
        "epoch"
    }

    async fn prepare(&self, job: &TrainingJobSpec) -> TrainingResult<()> {
        job.validate()?;
        self.layout().ensure_job_dirs(&job.job_id)?;
        self.set_status(&job.job_id, TrainerStatus::Preparing);
        Ok(())
    }

    async fn run(
        &self,
        job: &TrainingJobSpec,
        reader: &mut Reader,
        train: &[TrainingInstance],
        dev: Option<&[TrainingInstance]>,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<TrainingManifest> {
        job.validate()?;
        if train.is_empty() {
            return Err(TrainingError::Trainer("training set is empty".to_string()));
        }

        let layout = self.layout();
        layout.ensure_job_dirs(&job.job_id)?;
        progress.on_event(ProgressEvent::Started { job_id: job.job_id.clone() });

        if !reader.is_setup() {
            reader.setup_from_data(train)?;
        }
        let corpus_id = compute_corpus_id(train)?;
        if !self.is_cancelled(&job.job_id) {
            self.set_status(&job.job_id, TrainerStatus::Running);
        }

        let params = job.hyperparams;
        let batch_size = params.batch_size as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut indices: Vec<usize> = (0..train.len()).collect();
        let mut metrics = TrainingMetrics::default();

        for epoch in 1..=params.epochs {
            if self.is_cancelled(&job.job_id) {
                progress.on_event(ProgressEvent::Message {
                    job_id: job.job_id.clone(),
                    message: format!("cancelled before epoch {epoch}"),
                });
                break;
            }

            indices.shuffle(&mut rng);
            let mut loss_sum = 0.0;
            let mut batches = 0usize;
            for (iteration, chunk) in indices.chunks(batch_size).enumerate() {
                let batch: Vec<TrainingInstance> =
                    chunk.iter().map(|&i| train[i].clone()).collect();
                let loss = reader.train_step(&batch)?;
                loss_sum += loss;
                batches += 1;
                for hook in &self.hooks {
                    hook.at_iteration_end(epoch, iteration, loss);
                }
            }
            let mean_loss = if batches > 0 { loss_sum / batches as f64 } else { 0.0 };
            metrics.epoch_losses.push(mean_loss);

            if let Some(dev) = dev {
                let summary = evaluate(reader, dev, batch_size)?;
                metrics.exact_match = Some(summary.exact_match);
                metrics.f1 = Some(summary.f1);
            }

            let summary = EpochSummary {
                epoch,
                mean_loss,
                exact_match: metrics.exact_match,
                f1: metrics.f1,
            };
            for hook in &self.hooks {
                hook.at_epoch_end(&summary);
            }
            progress.on_event(ProgressEvent::Epoch {
                job_id: job.job_id.clone(),
                epoch,
                total: params.epochs,
                loss: mean_loss,
            });

            reader.store(&layout.epoch_dir(&job.job_id, epoch))?;
        }

        let final_dir = layout.final_dir(&job.job_id);
        reader.store(&final_dir)?;

        let shared_path = final_dir.join(SHARED_RESOURCES_FILE);
        let artifacts = vec![
            make_artifact(ArtifactKind::Checkpoint, final_dir.join(MODEL_FILE))?,
            make_artifact(ArtifactKind::SharedResources, shared_path.clone())?,
            make_artifact(ArtifactKind::Vocabulary, vocab_path(&shared_path))?,
        ];

        let manifest = TrainingManifest {
            job_id: job.job_id.clone(),
            created_at: chrono::Utc::now(),
            reader: job.reader.clone(),
            corpus_id,
            metrics,
            artifacts,
        };
        std::fs::write(
            layout.manifest_path(&job.job_id),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        if !self.is_cancelled(&job.job_id) {
            self.set_status(&job.job_id, TrainerStatus::Finished);
        }
        progress.on_event(ProgressEvent::Finished { job_id: job.job_id.clone() });
        info!(job_id = %job.job_id, checkpoint = %final_dir.display(), "training complete");
        Ok(manifest)
    }

    async fn status(&self, job_id: &TrainingJobId) -> TrainingResult<TrainerStatus> {
        Ok(self
            .statuses
            .lock()
            .ok()
            .and_then(|s| s.get(&job_id.0).cloned())
            .unwrap_or(TrainerStatus::Idle))
    }

    async fn cancel(&self, job_id: &TrainingJobId) -> TrainingResult<()> {
        self.set_status(job_id, TrainerStatus::Cancelled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::StdoutProgressSink;
    use lector_abstraction::{Answer, AnswerSpan, QASetting, ReaderConfig, SharedResources};
    use lector_models::default_registry;
    use std::path::Path;
    use tempfile::TempDir;

    fn corpus() -> Vec<TrainingInstance> {
        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(TrainingInstance {
                setting: QASetting::new(
                    "Who wrote the first program?",
                    vec!["Ada Lovelace wrote the first program.".to_string()],
                ),
                answers: vec![
                    Answer::new("Ada Lovelace")
                        .with_span(AnswerSpan { start: 0, end: 12, doc_idx: 0 }),
                ],
            });
        }
        out
    }

    #[tokio::test]
    async fn test_epoch_trainer_writes_checkpoints_and_manifest() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().to_path_buf();
        let data = corpus();

        let mut reader = default_registry()
            .create("lexical_span", SharedResources::new(ReaderConfig::new()))
            .unwrap();

        let mut job = TrainingJobSpec::new("lexical_span", Path::new("train.json").to_path_buf());
        job.hyperparams.epochs = 2;
        job.hyperparams.batch_size = 2;

        let trainer = EpochTrainer::new(workspace.clone());
        trainer.prepare(&job).await.unwrap();
        let manifest = trainer
            .run(&job, &mut reader, &data, Some(&data), &StdoutProgressSink)
            .await
            .unwrap();

        assert_eq!(manifest.metrics.epoch_losses.len(), 2);
        assert!(manifest.metrics.exact_match.is_some());
        assert_eq!(manifest.artifacts.len(), 3);

        let layout = TrainingLayout::for_workspace_root(&workspace);
        assert!(layout.manifest_path(&job.job_id).exists());
        assert!(layout.epoch_dir(&job.job_id, 1).join(MODEL_FILE).exists());
        assert!(layout.final_dir(&job.job_id).join(SHARED_RESOURCES_FILE).exists());

        // The final checkpoint restores through the registry.
        let restored = default_registry().load(&layout.final_dir(&job.job_id)).unwrap();
        assert!(restored.is_setup());

        assert_eq!(trainer.status(&job.job_id).await.unwrap(), TrainerStatus::Finished);
    }

    #[tokio::test]
    async fn test_cancel_before_run_skips_epochs() {
        let temp = TempDir::new().unwrap();
        let data = corpus();

        let mut reader = default_registry()
            .create("lexical_span", SharedResources::new(ReaderConfig::new()))
            .unwrap();

        let job = TrainingJobSpec::new("lexical_span", Path::new("train.json").to_path_buf());
        let trainer = EpochTrainer::new(temp.path().to_path_buf());
        trainer.prepare(&job).await.unwrap();
        trainer.cancel(&job.job_id).await.unwrap();

        let manifest =
            trainer.run(&job, &mut reader, &data, None, &StdoutProgressSink).await.unwrap();
        assert!(manifest.metrics.epoch_losses.is_empty());
        assert_eq!(trainer.status(&job.job_id).await.unwrap(), TrainerStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_spec_rejected() {
        let temp = TempDir::new().unwrap();
        let mut job = TrainingJobSpec::new("lexical_span", Path::new("train.json").to_path_buf());
        job.hyperparams.epochs = 0;

        let trainer = EpochTrainer::new(temp.path().to_path_buf());
        assert!(trainer.prepare(&job).await.is_err());
    }
}
