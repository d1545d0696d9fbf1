//! Answer questions with a stored reader.

use super::load_corpus_any;
use anyhow::{Context, Result};
use lector_abstraction::{Answer, QASetting};
use lector_models::default_registry;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Serialize)]
struct AnsweredQuestion {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    question: String,
    answers: Vec<Answer>,
}

pub fn execute(
    reader_dir: PathBuf,
    input: PathBuf,
    output: Option<PathBuf>,
    top_k: usize,
    batch_size: usize,
) -> Result<()> {
    let mut reader = default_registry()
        .load(&reader_dir)
        .with_context(|| format!("loading reader from {}", reader_dir.display()))?;
    reader.config_mut().set("top_k", top_k);

    let instances = load_corpus_any(&input)?;
    let settings: Vec<QASetting> = instances.into_iter().map(|i| i.setting).collect();
    info!(questions = settings.len(), "answering");

    let mut results = Vec::with_capacity(settings.len());
    for (setting, answers) in settings.iter().zip(reader.answers_iter(&settings, batch_size)) {
        results.push(AnsweredQuestion {
            id: setting.id.clone(),
            question: setting.question.clone(),
            answers: answers?,
        });
    }

    let json = serde_json::to_string_pretty(&results)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("writing answers to {}", path.display()))?;
            println!("wrote {} answers to {}", results.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
