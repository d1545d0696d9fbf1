//! Evaluate a stored reader on a labeled corpus.

use super::load_corpus_any;
use anyhow::{Context, Result};
use colored::Colorize;
use lector_models::default_registry;
use std::path::PathBuf;

pub fn execute(reader_dir: PathBuf, data: PathBuf, batch_size: usize) -> Result<()> {
    let reader = default_registry()
        .load(&reader_dir)
        .with_context(|| format!("loading reader from {}", reader_dir.display()))?;
    let instances = load_corpus_any(&data)?;

    let summary = lector_core::evaluate(&reader, &instances, batch_size)?;
    println!("{}", "Evaluation".bold());
    println!("  instances:   {}", summary.count);
    println!("  exact match: {:.3}", summary.exact_match);
    println!("  F1:          {:.3}", summary.f1);
    Ok(())
}
