//! Multiple-choice / entailment reader.
//!
//! Candidates come from the question itself or from a global
//! `answer_candidates` config key (the label set, for entailment). The
//! model is a smoothed token-candidate association table scored
//! naive-Bayes style; the output module ranks the candidates.

use crate::common::{init_token_vocab, text_ids};
use lector_abstraction::ports::standard::{
    CANDIDATE_IDS, CANDIDATE_SCORES, GOLD_CANDIDATE, QUESTION_IDS, SUPPORT_IDS,
};
use lector_abstraction::{
    Answer, Batch, InputModule, ModelModule, OutputModule, Port, QASetting, ReaderError,
    ReaderResult, SharedResources, TensorValue, TrainingInstance, UNK_ID, Vocab,
};
use lector_core::{Reader, normalize_answer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_TOP_K: usize = 1;

static INPUT_OUTPUT_PORTS: [Port; 3] = [QUESTION_IDS, SUPPORT_IDS, CANDIDATE_IDS];
static MODEL_INPUT_PORTS: [Port; 3] = [QUESTION_IDS, SUPPORT_IDS, CANDIDATE_IDS];
static MODEL_OUTPUT_PORTS: [Port; 2] = [CANDIDATE_SCORES, CANDIDATE_IDS];
static OUTPUT_INPUT_PORTS: [Port; 1] = [CANDIDATE_SCORES];

/// Assembles a fresh `lexical_mc` reader from shared resources.
pub fn reader_factory(shared: SharedResources) -> ReaderResult<Reader> {
    Ok(Reader::new(
        shared,
        Box::new(McInputModule::default()),
        Box::new(McModel::default()),
        Box::new(McOutputModule::default()),
    ))
}

/// Candidate strings for one setting: per-question candidates win,
/// the global `answer_candidates` key is the fallback.
fn candidate_texts(shared: &SharedResources, setting: &QASetting) -> ReaderResult<Vec<String>> {
    if let Some(candidates) = &setting.candidates {
        if !candidates.is_empty() {
            return Ok(candidates.clone());
        }
    }
    if let Some(items) = shared.config.get("answer_candidates").and_then(Value::as_array) {
        let fallback: Vec<String> =
            items.iter().filter_map(Value::as_str).map(String::from).collect();
        if !fallback.is_empty() {
            return Ok(fallback);
        }
    }
    Err(ReaderError::Config(format!(
        "no answer candidates for question `{}` (set per-question candidates or `answer_candidates`)",
        setting.question
    )))
}

pub struct McInputModule {
    lowercase: bool,
}

impl Default for McInputModule {
    fn default() -> Self {
        Self { lowercase: true }
    }
}

impl McInputModule {
    fn configure(&mut self, shared: &SharedResources) {
        self.lowercase = shared.config.get_bool("lowercase").unwrap_or(true);
    }

    fn answer_vocab(shared: &SharedResources) -> ReaderResult<&Vocab> {
        shared.answer_vocab.as_ref().ok_or_else(|| {
            ReaderError::Model("answer vocabulary missing; reader not set up".to_string())
        })
    }
}

impl InputModule for McInputModule {
    fn output_ports(&self) -> &[Port] {
        &INPUT_OUTPUT_PORTS
    }

    fn setup_from_data(
        &mut self,
        shared: &mut SharedResources,
        data: &[TrainingInstance],
    ) -> ReaderResult<()> {
        self.configure(shared);
        init_token_vocab(shared, data, self.lowercase)?;

        let mut answer_vocab = Vocab::new();
        for instance in data {
            for candidate in candidate_texts(shared, &instance.setting)? {
                answer_vocab.observe(candidate.trim());
            }
        }
        if answer_vocab.is_empty() {
            return Err(ReaderError::Config(
                "training data yields no answer candidates".to_string(),
            ));
        }
        answer_vocab.freeze();
        shared.answer_vocab = Some(answer_vocab);
        Ok(())
    }

    fn setup(&mut self, shared: &SharedResources) -> ReaderResult<()> {
        self.configure(shared);
        Self::answer_vocab(shared)?;
        Ok(())
    }

    fn encode(&self, shared: &SharedResources, settings: &[QASetting]) -> ReaderResult<Batch> {
        let answer_vocab = Self::answer_vocab(shared)?;

        let mut question_ids = Vec::with_capacity(settings.len());
        let mut support_ids = Vec::with_capacity(settings.len());
        let mut candidate_ids = Vec::with_capacity(settings.len());
        for setting in settings {
            question_ids.push(text_ids(&shared.vocab, &setting.question, self.lowercase));
            let mut ids = Vec::new();
            for doc in &setting.support {
                ids.extend(text_ids(&shared.vocab, doc, self.lowercase));
            }
            support_ids.push(ids);

            let candidates = candidate_texts(shared, setting)?;
            candidate_ids.push(
                candidates
                    .iter()
                    .map(|c| answer_vocab.get(c.trim()).unwrap_or(UNK_ID))
                    .collect(),
            );
        }

        let mut batch = Batch::new();
        batch.insert(QUESTION_IDS, TensorValue::IdMatrix(question_ids));
        batch.insert(SUPPORT_IDS, TensorValue::IdMatrix(support_ids));
        batch.insert(CANDIDATE_IDS, TensorValue::IdMatrix(candidate_ids));
        Ok(batch)
    }

    fn encode_with_answers(
        &self,
        shared: &SharedResources,
        data: &[TrainingInstance],
    ) -> ReaderResult<Batch> {
        let settings: Vec<QASetting> = data.iter().map(|i| i.setting.clone()).collect();
        let mut batch = self.encode(shared, &settings)?;

        let mut gold = Vec::with_capacity(data.len());
        for instance in data {
            let candidates = candidate_texts(shared, &instance.setting)?;
            gold.push(find_gold(instance, &candidates));
        }
        batch.insert(GOLD_CANDIDATE, TensorValue::Indices(gold));
        Ok(batch)
    }
}

/// Position of the first candidate matching a gold answer, by
/// normalized text.
fn find_gold(instance: &TrainingInstance, candidates: &[String]) -> Option<usize> {
    for answer in &instance.answers {
        let target = normalize_answer(&answer.text);
        if target.is_empty() {
            continue;
        }
        if let Some(position) =
            candidates.iter().position(|c| normalize_answer(c) == target)
        {
            return Some(position);
        }
    }
    None
}

/// Naive-Bayes style candidate scorer over a token-candidate
/// association table, Laplace smoothed.
#[derive(Debug, Default)]
pub struct McModel {
    assoc: BTreeMap<(u32, u32), u64>,
    candidate_counts: Vec<u64>,
    candidate_token_totals: Vec<u64>,
    instance_total: u64,
    vocab_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct McCheckpoint {
    assoc: Vec<(u32, u32, u64)>,
    candidate_counts: Vec<u64>,
    candidate_token_totals: Vec<u64>,
    instance_total: u64,
}

impl McModel {
    fn token_set(question: &[u32], support: &[u32]) -> BTreeSet<u32> {
        question
            .iter()
            .chain(support.iter())
            .copied()
            .filter(|&t| t != UNK_ID)
            .collect()
    }

    fn score(&self, candidate: u32, tokens: &BTreeSet<u32>) -> f64 {
        let c = candidate as usize;
        let candidate_count = self.candidate_counts.get(c).copied().unwrap_or(0) as f64;
        let num_candidates = self.candidate_counts.len().max(1) as f64;
        let prior =
            ((candidate_count + 1.0) / (self.instance_total as f64 + num_candidates)).ln();

        let denom = self.candidate_token_totals.get(c).copied().unwrap_or(0) as f64
            + self.vocab_size.max(1) as f64;
        let likelihood: f64 = tokens
            .iter()
            .map(|&t| {
                let count = self.assoc.get(&(t, candidate)).copied().unwrap_or(0) as f64;
                ((count + 1.0) / denom).ln()
            })
            .sum();

        prior + likelihood
    }

    fn best_candidate(&self, candidates: &[u32], tokens: &BTreeSet<u32>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (ci, &candidate) in candidates.iter().enumerate() {
            let score = self.score(candidate, tokens);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((ci, score));
            }
        }
        best.map(|(ci, _)| ci)
    }
}

impl ModelModule for McModel {
    fn input_ports(&self) -> &[Port] {
        &MODEL_INPUT_PORTS
    }

    fn output_ports(&self) -> &[Port] {
        &MODEL_OUTPUT_PORTS
    }

    fn setup(&mut self, shared: &SharedResources) -> ReaderResult<()> {
        let candidates = shared
            .answer_vocab
            .as_ref()
            .ok_or_else(|| {
                ReaderError::Model("answer vocabulary missing; reader not set up".to_string())
            })?
            .len();
        self.assoc.clear();
        self.candidate_counts = vec![0; candidates];
        self.candidate_token_totals = vec![0; candidates];
        self.instance_total = 0;
        self.vocab_size = shared.vocab.len();
        Ok(())
    }

    fn train_step(&mut self, batch: &Batch) -> ReaderResult<f64> {
        let questions = batch.id_matrix(QUESTION_IDS)?;
        let supports = batch.id_matrix(SUPPORT_IDS)?;
        let candidates = batch.id_matrix(CANDIDATE_IDS)?;
        let golds = batch.indices(GOLD_CANDIDATE)?;

        let mut errors = 0usize;
        let mut scored = 0usize;
        for i in 0..candidates.len() {
            let Some(gold) = golds[i] else { continue };
            let Some(&gold_candidate) = candidates[i].get(gold) else {
                return Err(ReaderError::Model(format!(
                    "gold candidate {gold} out of range for instance {i}"
                )));
            };
            scored += 1;
            let tokens = Self::token_set(&questions[i], &supports[i]);
            if self.best_candidate(&candidates[i], &tokens) != Some(gold) {
                errors += 1;
            }

            if let Some(slot) = self.candidate_counts.get_mut(gold_candidate as usize) {
                *slot += 1;
            }
            self.instance_total += 1;
            for &t in &tokens {
                *self.assoc.entry((t, gold_candidate)).or_insert(0) += 1;
                if let Some(slot) =
                    self.candidate_token_totals.get_mut(gold_candidate as usize)
                {
                    *slot += 1;
                }
            }
        }

        let loss = if scored == 0 { 0.0 } else { errors as f64 / scored as f64 };
        debug!(scored, errors, loss, "mc train step");
        Ok(loss)
    }

    fn predict(&self, batch: &Batch) -> ReaderResult<Batch> {
        let questions = batch.id_matrix(QUESTION_IDS)?;
        let supports = batch.id_matrix(SUPPORT_IDS)?;
        let candidates = batch.id_matrix(CANDIDATE_IDS)?;

        let mut scores = Vec::with_capacity(candidates.len());
        for i in 0..candidates.len() {
            let tokens = Self::token_set(&questions[i], &supports[i]);
            let row: Vec<f32> =
                candidates[i].iter().map(|&c| self.score(c, &tokens) as f32).collect();
            scores.push(row);
        }

        let mut out = Batch::new();
        out.insert(CANDIDATE_SCORES, TensorValue::FloatMatrix(scores));
        out.insert(CANDIDATE_IDS, TensorValue::IdMatrix(candidates.to_vec()));
        Ok(out)
    }

    fn store(&self, path: &Path) -> ReaderResult<()> {
        let checkpoint = McCheckpoint {
            assoc: self.assoc.iter().map(|(&(t, c), &n)| (t, c, n)).collect(),
            candidate_counts: self.candidate_counts.clone(),
            candidate_token_totals: self.candidate_token_totals.clone(),
            instance_total: self.instance_total,
        };
        fs::write(path, serde_json::to_string_pretty(&checkpoint)?)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> ReaderResult<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            ReaderError::Model(format!("model checkpoint not found at {}: {e}", path.display()))
        })?;
        let checkpoint: McCheckpoint = serde_json::from_str(&text)?;
        if checkpoint.candidate_counts.len() != self.candidate_counts.len() {
            return Err(ReaderError::Model(format!(
                "checkpoint candidate count {} does not match {}",
                checkpoint.candidate_counts.len(),
                self.candidate_counts.len()
            )));
        }
        self.assoc = checkpoint.assoc.into_iter().map(|(t, c, n)| ((t, c), n)).collect();
        self.candidate_counts = checkpoint.candidate_counts;
        self.candidate_token_totals = checkpoint.candidate_token_totals;
        self.instance_total = checkpoint.instance_total;
        Ok(())
    }
}

pub struct McOutputModule {
    top_k: usize,
}

impl Default for McOutputModule {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

impl OutputModule for McOutputModule {
    fn input_ports(&self) -> &[Port] {
        &OUTPUT_INPUT_PORTS
    }

    fn decode(
        &self,
        shared: &SharedResources,
        settings: &[QASetting],
        predictions: &Batch,
    ) -> ReaderResult<Vec<Vec<Answer>>> {
        let top_k = shared.config.get_usize("top_k").unwrap_or(self.top_k).max(1);
        let scores = predictions.float_matrix(CANDIDATE_SCORES)?;

        let mut out = Vec::with_capacity(settings.len());
        for (i, setting) in settings.iter().enumerate() {
            let candidates = candidate_texts(shared, setting)?;
            let row = &scores[i];
            if row.len() != candidates.len() {
                return Err(ReaderError::Model(format!(
                    "{} scores for {} candidates",
                    row.len(),
                    candidates.len()
                )));
            }

            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
            let probs = softmax(row);

            let answers: Vec<Answer> = order
                .iter()
                .take(top_k)
                .map(|&ci| Answer::new(candidates[ci].clone()).with_score(probs[ci]))
                .collect();
            out.push(answers);
        }
        Ok(out)
    }
}

fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; scores.len()];
    }
    let exps: Vec<f64> = scores.iter().map(|&s| f64::from(s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lector_abstraction::ReaderConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn nli_instance(premise: &str, hypothesis: &str, label: &str) -> TrainingInstance {
        TrainingInstance {
            setting: QASetting::new(hypothesis, vec![premise.to_string()]),
            answers: vec![Answer::new(label)],
        }
    }

    fn nli_corpus() -> Vec<TrainingInstance> {
        let mut out = Vec::new();
        for _ in 0..4 {
            out.push(nli_instance(
                "A dog runs through the park.",
                "An animal is outside.",
                "entailment",
            ));
            out.push(nli_instance(
                "A dog runs through the park.",
                "The dog is asleep indoors.",
                "contradiction",
            ));
            out.push(nli_instance(
                "A man reads a book.",
                "The man is a teacher.",
                "neutral",
            ));
        }
        out
    }

    fn fresh_reader() -> Reader {
        let mut config = ReaderConfig::new();
        config.set(
            "answer_candidates",
            json!(["entailment", "neutral", "contradiction"]),
        );
        reader_factory(SharedResources::new(config)).unwrap()
    }

    #[test]
    fn test_training_reduces_to_gold_label() {
        let data = nli_corpus();
        let mut reader = fresh_reader();
        reader.setup_from_data(&data).unwrap();
        for _ in 0..3 {
            reader.train_step(&data).unwrap();
        }

        let answers = reader.answers(&[data[0].setting.clone()]).unwrap();
        assert_eq!(answers[0][0].text, "entailment");
    }

    #[test]
    fn test_per_question_candidates_win() {
        let data = nli_corpus();
        let mut reader = fresh_reader();
        reader.setup_from_data(&data).unwrap();
        reader.train_step(&data).unwrap();

        let setting = QASetting::new("An animal is outside.", vec!["A dog runs.".to_string()])
            .with_candidates(vec!["entailment".to_string(), "neutral".to_string()]);
        let answers = reader.answers(&[setting]).unwrap();
        assert_eq!(answers[0].len(), 1);
        assert!(["entailment", "neutral"].contains(&answers[0][0].text.as_str()));
    }

    #[test]
    fn test_missing_candidates_fail() {
        let data = nli_corpus();
        let mut reader = reader_factory(SharedResources::new(ReaderConfig::new())).unwrap();
        // No per-question candidates and no global label set.
        let stripped: Vec<TrainingInstance> = data
            .iter()
            .map(|i| TrainingInstance {
                setting: QASetting::new(i.setting.question.clone(), i.setting.support.clone()),
                answers: i.answers.clone(),
            })
            .collect();
        assert!(reader.setup_from_data(&stripped).is_err());
    }

    #[test]
    fn test_store_load_round_trip_preserves_predictions() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("reader");
        let data = nli_corpus();

        let mut reader = fresh_reader();
        reader.setup_from_data(&data).unwrap();
        reader.train_step(&data).unwrap();
        let settings: Vec<QASetting> = data.iter().map(|i| i.setting.clone()).collect();
        let before = reader.answers(&settings).unwrap();
        reader.store(&dir).unwrap();

        let mut restored = fresh_reader();
        restored.load(&dir).unwrap();
        let after = restored.answers(&settings).unwrap();
        assert_eq!(before, after);

        let restored_vocab = &restored.shared().answer_vocab;
        assert!(restored_vocab.as_ref().is_some_and(|v| v.get("entailment").is_some()));
    }
}
