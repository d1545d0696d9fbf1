//! Loader for the JSON QA corpus format.
//!
//! A corpus document holds instances, each pairing support passages with
//! one or more questions; questions carry answers as text, character
//! spans, or both. Loading flattens instances × questions into an
//! ordered list of training pairs, preserving file declaration order.

use crate::text::char_slice;
use ignore::WalkBuilder;
use lector_abstraction::{Answer, AnswerSpan, QASetting, ReaderError, ReaderResult, TrainingInstance};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CorpusDoc {
    #[serde(default)]
    #[allow(dead_code)]
    meta: serde_json::Value,
    instances: Vec<InstanceDoc>,
}

#[derive(Debug, Deserialize)]
struct InstanceDoc {
    #[serde(default)]
    support: Vec<SupportDoc>,
    questions: Vec<QuestionDoc>,
}

/// Support passages may be plain strings or `{"text": ...}` objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SupportDoc {
    Text(String),
    Object { text: String },
}

impl SupportDoc {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Object { text } => text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuestionDoc {
    #[serde(default)]
    id: Option<String>,
    question: String,
    #[serde(default)]
    candidates: Option<Vec<SupportDoc>>,
    #[serde(default)]
    answers: Vec<AnswerDoc>,
}

#[derive(Debug, Deserialize)]
struct AnswerDoc {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    span: Option<[usize; 2]>,
    #[serde(default)]
    doc_idx: usize,
}

/// Parses a corpus file into ordered (question, answers) pairs.
pub fn load_corpus(path: &Path) -> ReaderResult<Vec<TrainingInstance>> {
    let text = fs::read_to_string(path).map_err(|e| {
        ReaderError::Corpus(format!("cannot read corpus {}: {e}", path.display()))
    })?;
    let doc: CorpusDoc = serde_json::from_str(&text)
        .map_err(|e| ReaderError::Corpus(format!("{}: {e}", path.display())))?;

    let mut out = Vec::new();
    for (instance_idx, instance) in doc.instances.into_iter().enumerate() {
        let support: Vec<String> =
            instance.support.into_iter().map(SupportDoc::into_text).collect();
        for question in instance.questions {
            out.push(build_instance(&support, question, instance_idx)?);
        }
    }
    debug!(pairs = out.len(), "loaded corpus from {}", path.display());
    Ok(out)
}

/// Loads every `*.json` file under `dir`, in sorted path order.
pub fn load_corpus_dir(dir: &Path) -> ReaderResult<Vec<TrainingInstance>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkBuilder::new(dir).follow_links(false).build() {
        let entry = entry.map_err(|e| ReaderError::Corpus(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_some_and(|ft| ft.is_file())
            && path.extension().is_some_and(|e| e == "json")
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(ReaderError::Corpus(format!(
            "no corpus files (*.json) under {}",
            dir.display()
        )));
    }

    let mut out = Vec::new();
    for file in files {
        out.extend(load_corpus(&file)?);
    }
    Ok(out)
}

fn build_instance(
    support: &[String],
    question: QuestionDoc,
    instance_idx: usize,
) -> ReaderResult<TrainingInstance> {
    let mut setting = QASetting::new(question.question, support.to_vec());
    setting.id = question.id;
    if let Some(candidates) = question.candidates {
        setting.candidates =
            Some(candidates.into_iter().map(SupportDoc::into_text).collect());
    }

    let mut answers = Vec::with_capacity(question.answers.len());
    for answer in question.answers {
        answers.push(build_answer(support, answer, instance_idx)?);
    }
    Ok(TrainingInstance { setting, answers })
}

fn build_answer(
    support: &[String],
    answer: AnswerDoc,
    instance_idx: usize,
) -> ReaderResult<Answer> {
    let span = match answer.span {
        Some([start, end]) => {
            let doc = support.get(answer.doc_idx).ok_or_else(|| {
                ReaderError::Corpus(format!(
                    "instance {instance_idx}: answer doc_idx {} out of range ({} supports)",
                    answer.doc_idx,
                    support.len()
                ))
            })?;
            if start > end {
                return Err(ReaderError::Corpus(format!(
                    "instance {instance_idx}: answer span [{start}, {end}] ends before it starts"
                )));
            }
            let doc_chars = doc.chars().count();
            if end > doc_chars {
                return Err(ReaderError::Corpus(format!(
                    "instance {instance_idx}: answer span [{start}, {end}] exceeds support length {doc_chars}"
                )));
            }
            Some(AnswerSpan { start, end, doc_idx: answer.doc_idx })
        }
        None => None,
    };

    let text = match (answer.text, span) {
        (Some(text), _) => text,
        (None, Some(span)) => char_slice(&support[span.doc_idx], span.start, span.end),
        (None, None) => {
            return Err(ReaderError::Corpus(format!(
                "instance {instance_idx}: answer has neither text nor span"
            )));
        }
    };

    Ok(Answer { text, span, score: 1.0 })
}
