//! Train a reader from a layered configuration file.

use super::load_corpus_any;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use lector_abstraction::SharedResources;
use lector_core::load_config;
use lector_models::default_registry;
use lector_training::{
    EpochTrainer, LossHook, StdoutProgressSink, Trainer, TrainingJobSpec, TrainingLayout,
};
use std::path::PathBuf;

pub async fn execute(config_path: PathBuf, workspace: PathBuf) -> Result<()> {
    let config = load_config(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let reader_name = config.require_str("reader")?.to_string();
    let Some(train_path) = config.get_path("train") else {
        bail!("config {} has no `train` corpus path", config_path.display());
    };
    let dev_path = config.get_path("dev");

    let train_data = load_corpus_any(&train_path)
        .with_context(|| format!("loading training corpus {}", train_path.display()))?;
    let dev_data = match &dev_path {
        Some(path) => Some(
            load_corpus_any(path)
                .with_context(|| format!("loading dev corpus {}", path.display()))?,
        ),
        None => None,
    };

    let mut job = TrainingJobSpec::new(reader_name.clone(), train_path);
    if let Some(dev_path) = dev_path {
        job = job.with_dev(dev_path);
    }
    if let Some(seed) = config.get_u64("seed") {
        job.hyperparams.seed = seed;
    }
    if let Some(epochs) = config.get_usize("epochs") {
        job.hyperparams.epochs = epochs as u32;
    }
    if let Some(batch_size) = config.get_usize("batch_size") {
        job.hyperparams.batch_size = batch_size as u32;
    }

    let mut reader = default_registry().create(&reader_name, SharedResources::new(config))?;

    let trainer = EpochTrainer::new(workspace.clone()).with_hook(Box::new(LossHook::new(10)));
    trainer.prepare(&job).await?;
    let manifest = trainer
        .run(&job, &mut reader, &train_data, dev_data.as_deref(), &StdoutProgressSink)
        .await?;

    let layout = TrainingLayout::for_workspace_root(&workspace);
    println!();
    println!("{} {}", "Trained".green().bold(), reader_name.bold());
    println!("  job:        {}", manifest.job_id);
    println!("  reader dir: {}", layout.final_dir(&manifest.job_id).display());
    println!("  manifest:   {}", layout.manifest_path(&manifest.job_id).display());
    if let Some(loss) = manifest.metrics.epoch_losses.last() {
        println!("  final loss: {loss:.4}");
    }
    if let (Some(em), Some(f1)) = (manifest.metrics.exact_match, manifest.metrics.f1) {
        println!("  dev:        EM {:.3}  F1 {:.3}", em, f1);
    }
    Ok(())
}
