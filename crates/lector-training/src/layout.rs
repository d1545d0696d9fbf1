use crate::error::TrainingResult;
use crate::job::TrainingJobId;
use std::path::{Path, PathBuf};

/// Filesystem layout for training jobs inside a workspace.
///
/// Default layout is under `.lector/training/<job_id>/...`
#[derive(Debug, Clone)]
pub struct TrainingLayout {
    root: PathBuf,
}

impl TrainingLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create a layout rooted in a workspace directory.
    #[must_use]
    pub fn for_workspace_root(workspace_root: &Path) -> Self {
        Self::new(workspace_root.join(".lector").join("training"))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn job_dir(&self, job_id: &TrainingJobId) -> PathBuf {
        self.root.join(job_id.0.as_str())
    }

    #[must_use]
    pub fn manifest_path(&self, job_id: &TrainingJobId) -> PathBuf {
        self.job_dir(job_id).join("training_manifest.json")
    }

    #[must_use]
    pub fn checkpoints_dir(&self, job_id: &TrainingJobId) -> PathBuf {
        self.job_dir(job_id).join("checkpoints")
    }

    /// Reader directory written after epoch `epoch`.
    #[must_use]
    pub fn epoch_dir(&self, job_id: &TrainingJobId, epoch: u32) -> PathBuf {
        self.checkpoints_dir(job_id).join(format!("epoch_{epoch}"))
    }

    /// Reader directory written once training finishes.
    #[must_use]
    pub fn final_dir(&self, job_id: &TrainingJobId) -> PathBuf {
        self.checkpoints_dir(job_id).join("final")
    }

    pub fn ensure_job_dirs(&self, job_id: &TrainingJobId) -> TrainingResult<()> {
        std::fs::create_dir_all(self.job_dir(job_id))?;
        std::fs::create_dir_all(self.checkpoints_dir(job_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = TrainingLayout::for_workspace_root(temp.path());
        let id = TrainingJobId("job-1".to_string());

        assert!(layout.root().to_string_lossy().contains(".lector"));
        assert!(layout.job_dir(&id).to_string_lossy().contains("job-1"));
        assert!(layout.epoch_dir(&id, 3).to_string_lossy().ends_with("epoch_3"));

        layout.ensure_job_dirs(&id).unwrap();
        assert!(layout.checkpoints_dir(&id).is_dir());
    }
}
