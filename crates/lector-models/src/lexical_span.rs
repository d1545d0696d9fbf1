//! Extractive span reader.
//!
//! The input module turns questions and supports into token ids and
//! enumerates candidate token spans; the model scores spans from three
//! count tables (answer affinity, corpus frequency, question context)
//! learned from gold spans; the output module maps the best spans back
//! to character offsets and text.

use crate::common::{init_token_vocab, norm_token, text_ids};
use lector_abstraction::ports::standard::{
    CANDIDATE_SPANS, GOLD_CANDIDATE, QUESTION_IDS, SPAN_SCORES, SUPPORT_IDS, TOKEN_OFFSETS,
};
use lector_abstraction::{
    Answer, AnswerSpan, Batch, InputModule, ModelModule, OutputModule, Port, QASetting,
    ReaderError, ReaderResult, SharedResources, TensorValue, TokenSpan, TrainingInstance, UNK_ID,
};
use lector_core::{Reader, char_slice, normalize_answer, tokenize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_MAX_SPAN_LEN: usize = 5;
const DEFAULT_CONTEXT_WINDOW: usize = 8;
const DEFAULT_TOP_K: usize = 1;

static INPUT_OUTPUT_PORTS: [Port; 4] =
    [QUESTION_IDS, SUPPORT_IDS, TOKEN_OFFSETS, CANDIDATE_SPANS];
static MODEL_INPUT_PORTS: [Port; 3] = [QUESTION_IDS, SUPPORT_IDS, CANDIDATE_SPANS];
static MODEL_OUTPUT_PORTS: [Port; 3] = [SPAN_SCORES, CANDIDATE_SPANS, TOKEN_OFFSETS];
static OUTPUT_INPUT_PORTS: [Port; 3] = [SPAN_SCORES, CANDIDATE_SPANS, TOKEN_OFFSETS];

/// Assembles a fresh `lexical_span` reader from shared resources.
pub fn reader_factory(shared: SharedResources) -> ReaderResult<Reader> {
    Ok(Reader::new(
        shared,
        Box::new(SpanInputModule::default()),
        Box::new(SpanModel::default()),
        Box::new(SpanOutputModule::default()),
    ))
}

pub struct SpanInputModule {
    lowercase: bool,
    max_span_len: usize,
}

impl Default for SpanInputModule {
    fn default() -> Self {
        Self { lowercase: true, max_span_len: DEFAULT_MAX_SPAN_LEN }
    }
}

impl SpanInputModule {
    fn configure(&mut self, shared: &SharedResources) {
        self.lowercase = shared.config.get_bool("lowercase").unwrap_or(true);
        self.max_span_len =
            shared.config.get_usize("max_span_len").unwrap_or(DEFAULT_MAX_SPAN_LEN).max(1);
    }

    /// Character range of a candidate span, through the token offsets of
    /// its instance.
    fn char_range(candidate: TokenSpan, offsets: &[TokenSpan]) -> (usize, usize) {
        (offsets[candidate.start].start, offsets[candidate.end - 1].end)
    }
}

impl InputModule for SpanInputModule {
    fn output_ports(&self) -> &[Port] {
        &INPUT_OUTPUT_PORTS
    }

    fn setup_from_data(
        &mut self,
        shared: &mut SharedResources,
        data: &[TrainingInstance],
    ) -> ReaderResult<()> {
        self.configure(shared);
        init_token_vocab(shared, data, self.lowercase)
    }

    fn setup(&mut self, shared: &SharedResources) -> ReaderResult<()> {
        self.configure(shared);
        Ok(())
    }

    fn encode(&self, shared: &SharedResources, settings: &[QASetting]) -> ReaderResult<Batch> {
        let mut question_ids = Vec::with_capacity(settings.len());
        let mut support_ids = Vec::with_capacity(settings.len());
        let mut token_offsets = Vec::with_capacity(settings.len());
        let mut candidate_spans = Vec::with_capacity(settings.len());

        for setting in settings {
            question_ids.push(text_ids(&shared.vocab, &setting.question, self.lowercase));

            let mut ids = Vec::new();
            let mut offsets = Vec::new();
            let mut candidates = Vec::new();
            for (doc_idx, doc) in setting.support.iter().enumerate() {
                let tokens = tokenize(doc);
                let base = ids.len();
                for token in &tokens {
                    ids.push(
                        shared
                            .vocab
                            .get(&norm_token(&token.text, self.lowercase))
                            .unwrap_or(UNK_ID),
                    );
                    offsets.push(TokenSpan { doc: doc_idx, start: token.start, end: token.end });
                }
                for start in 0..tokens.len() {
                    let max_end = (start + self.max_span_len).min(tokens.len());
                    for end in start + 1..=max_end {
                        candidates.push(TokenSpan {
                            doc: doc_idx,
                            start: base + start,
                            end: base + end,
                        });
                    }
                }
            }
            support_ids.push(ids);
            token_offsets.push(offsets);
            candidate_spans.push(candidates);
        }

        let mut batch = Batch::new();
        batch.insert(QUESTION_IDS, TensorValue::IdMatrix(question_ids));
        batch.insert(SUPPORT_IDS, TensorValue::IdMatrix(support_ids));
        batch.insert(TOKEN_OFFSETS, TensorValue::Spans(token_offsets));
        batch.insert(CANDIDATE_SPANS, TensorValue::Spans(candidate_spans));
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
        {
            let candidate_spans = batch.spans(CANDIDATE_SPANS)?;
            let token_offsets = batch.spans(TOKEN_OFFSETS)?;
            for (i, instance) in data.iter().enumerate() {
                gold.push(Self::find_gold(
                    instance,
                    &candidate_spans[i],
                    &token_offsets[i],
                ));
            }
        }
        batch.insert(GOLD_CANDIDATE, TensorValue::Indices(gold));
        Ok(batch)
    }
}

impl SpanInputModule {
    /// Candidate matching a gold answer: by exact character span first,
    /// by normalized text otherwise.
    fn find_gold(
        instance: &TrainingInstance,
        candidates: &[TokenSpan],
        offsets: &[TokenSpan],
    ) -> Option<usize> {
        for answer in &instance.answers {
            if let Some(span) = answer.span {
                for (ci, candidate) in candidates.iter().enumerate() {
                    let (start, end) = Self::char_range(*candidate, offsets);
                    if candidate.doc == span.doc_idx && start == span.start && end == span.end {
                        return Some(ci);
                    }
                }
            }
            let target = normalize_answer(&answer.text);
            if target.is_empty() {
                continue;
            }
            for (ci, candidate) in candidates.iter().enumerate() {
                let (start, end) = Self::char_range(*candidate, offsets);
                let text = char_slice(&instance.setting.support[candidate.doc], start, end);
                if normalize_answer(&text) == target {
                    return Some(ci);
                }
            }
        }
        None
    }
}

/// Span scorer over three count tables, Laplace smoothed.
///
/// A span's score is the mean answer affinity of its tokens plus a
/// context bonus for question tokens observed near it; affinities are
/// log ratios of answer counts to corpus counts.
#[derive(Debug, Default)]
pub struct SpanModel {
    answer_counts: Vec<u64>,
    corpus_counts: Vec<u64>,
    context_counts: Vec<u64>,
    answer_total: u64,
    corpus_total: u64,
    context_total: u64,
    context_window: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct SpanCheckpoint {
    answer_counts: Vec<u64>,
    corpus_counts: Vec<u64>,
    context_counts: Vec<u64>,
    answer_total: u64,
    corpus_total: u64,
    context_total: u64,
}

impl SpanModel {
    fn table(counts: &[u64], id: u32) -> f64 {
        counts.get(id as usize).copied().unwrap_or(0) as f64
    }

    fn affinity(&self, id: u32) -> f64 {
        ((Self::table(&self.answer_counts, id) + 1.0)
            / (Self::table(&self.corpus_counts, id) + 1.0))
            .ln()
    }

    fn context_weight(&self, id: u32) -> f64 {
        ((Self::table(&self.context_counts, id) + 1.0)
            / (Self::table(&self.corpus_counts, id) + 1.0))
            .ln()
    }

    fn score_span(&self, candidate: TokenSpan, support: &[u32], question: &HashSet<u32>) -> f64 {
        let len = candidate.end.saturating_sub(candidate.start).max(1);
        let affinity: f64 =
            support[candidate.start..candidate.end].iter().map(|&t| self.affinity(t)).sum::<f64>()
                / len as f64;

        let window_start = candidate.start.saturating_sub(self.context_window);
        let window_end = (candidate.end + self.context_window).min(support.len());
        let window = &support[window_start..window_end];
        let context: f64 = question
            .iter()
            .filter(|q| window.contains(*q))
            .map(|&q| self.context_weight(q))
            .sum();

        affinity + context
    }

    fn best_candidate(
        &self,
        candidates: &[TokenSpan],
        support: &[u32],
        question: &HashSet<u32>,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (ci, &candidate) in candidates.iter().enumerate() {
            let score = self.score_span(candidate, support, question);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((ci, score));
            }
        }
        best.map(|(ci, _)| ci)
    }

    fn bump(counts: &mut [u64], total: &mut u64, id: u32) {
        if id == UNK_ID {
            return;
        }
        if let Some(slot) = counts.get_mut(id as usize) {
            *slot += 1;
            *total += 1;
        }
    }
}

impl ModelModule for SpanModel {
    fn input_ports(&self) -> &[Port] {
        &MODEL_INPUT_PORTS
    }

    fn output_ports(&self) -> &[Port] {
        &MODEL_OUTPUT_PORTS
    }

    fn setup(&mut self, shared: &SharedResources) -> ReaderResult<()> {
        let size = shared.vocab.len();
        self.answer_counts = vec![0; size];
        self.corpus_counts = vec![0; size];
        self.context_counts = vec![0; size];
        self.answer_total = 0;
        self.corpus_total = 0;
        self.context_total = 0;
        self.context_window =
            shared.config.get_usize("context_window").unwrap_or(DEFAULT_CONTEXT_WINDOW);
        Ok(())
    }

    fn train_step(&mut self, batch: &Batch) -> ReaderResult<f64> {
        let questions = batch.id_matrix(QUESTION_IDS)?;
        let supports = batch.id_matrix(SUPPORT_IDS)?;
        let candidates = batch.spans(CANDIDATE_SPANS)?;
        let golds = batch.indices(GOLD_CANDIDATE)?;

        let mut errors = 0usize;
        let mut scored = 0usize;
        let mut updates: Vec<(usize, usize)> = Vec::new();
        for i in 0..supports.len() {
            let Some(gold) = golds[i] else { continue };
            if candidates[i].get(gold).is_none() {
                return Err(ReaderError::Model(format!(
                    "gold candidate {gold} out of range for instance {i}"
                )));
            }
            scored += 1;
            let question: HashSet<u32> =
                questions[i].iter().copied().filter(|&t| t != UNK_ID).collect();
            if self.best_candidate(&candidates[i], &supports[i], &question) != Some(gold) {
                errors += 1;
            }
            updates.push((i, gold));
        }

        for (i, gold) in updates {
            let support = &supports[i];
            let span = candidates[i][gold];
            for &t in support.iter() {
                Self::bump(&mut self.corpus_counts, &mut self.corpus_total, t);
            }
            for &t in &support[span.start..span.end] {
                Self::bump(&mut self.answer_counts, &mut self.answer_total, t);
            }
            let window_start = span.start.saturating_sub(self.context_window);
            let window_end = (span.end + self.context_window).min(support.len());
            let window = &support[window_start..window_end];
            let question: HashSet<u32> =
                questions[i].iter().copied().filter(|&t| t != UNK_ID).collect();
            for &q in question.iter().filter(|q| window.contains(*q)) {
                Self::bump(&mut self.context_counts, &mut self.context_total, q);
            }
        }

        let loss = if scored == 0 { 0.0 } else { errors as f64 / scored as f64 };
        debug!(scored, errors, loss, "span train step");
        Ok(loss)
    }

    fn predict(&self, batch: &Batch) -> ReaderResult<Batch> {
        let questions = batch.id_matrix(QUESTION_IDS)?;
        let supports = batch.id_matrix(SUPPORT_IDS)?;
        let candidates = batch.spans(CANDIDATE_SPANS)?;
        let offsets = batch.spans(TOKEN_OFFSETS)?;

        let mut scores = Vec::with_capacity(supports.len());
        for i in 0..supports.len() {
            let question: HashSet<u32> =
                questions[i].iter().copied().filter(|&t| t != UNK_ID).collect();
            let row: Vec<f32> = candidates[i]
                .iter()
                .map(|&c| self.score_span(c, &supports[i], &question) as f32)
                .collect();
            scores.push(row);
        }

        let mut out = Batch::new();
        out.insert(SPAN_SCORES, TensorValue::FloatMatrix(scores));
        out.insert(CANDIDATE_SPANS, TensorValue::Spans(candidates.to_vec()));
        out.insert(TOKEN_OFFSETS, TensorValue::Spans(offsets.to_vec()));
        Ok(out)
    }

    fn store(&self, path: &Path) -> ReaderResult<()> {
        let checkpoint = SpanCheckpoint {
            answer_counts: self.answer_counts.clone(),
            corpus_counts: self.corpus_counts.clone(),
            context_counts: self.context_counts.clone(),
            answer_total: self.answer_total,
            corpus_total: self.corpus_total,
            context_total: self.context_total,
        };
        fs::write(path, serde_json::to_string_pretty(&checkpoint)?)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> ReaderResult<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            ReaderError::Model(format!("model checkpoint not found at {}: {e}", path.display()))
        })?;
        let checkpoint: SpanCheckpoint = serde_json::from_str(&text)?;
        if checkpoint.answer_counts.len() != self.answer_counts.len() {
            return Err(ReaderError::Model(format!(
                "checkpoint vocabulary size {} does not match {}",
                checkpoint.answer_counts.len(),
                self.answer_counts.len()
            )));
        }
        self.answer_counts = checkpoint.answer_counts;
        self.corpus_counts = checkpoint.corpus_counts;
        self.context_counts = checkpoint.context_counts;
        self.answer_total = checkpoint.answer_total;
        self.corpus_total = checkpoint.corpus_total;
        self.context_total = checkpoint.context_total;
        Ok(())
    }
}

pub struct SpanOutputModule {
    top_k: usize,
}

impl Default for SpanOutputModule {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

impl OutputModule for SpanOutputModule {
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
        let scores = predictions.float_matrix(SPAN_SCORES)?;
        let candidates = predictions.spans(CANDIDATE_SPANS)?;
        let offsets = predictions.spans(TOKEN_OFFSETS)?;

        let mut out = Vec::with_capacity(settings.len());
        for (i, setting) in settings.iter().enumerate() {
            let row = &scores[i];
            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));

            let probs = softmax(row);
            let mut answers = Vec::with_capacity(top_k.min(order.len()));
            for &ci in order.iter().take(top_k) {
                let candidate = candidates[i][ci];
                let (start, end) = SpanInputModule::char_range(candidate, &offsets[i]);
                let text = char_slice(&setting.support[candidate.doc], start, end);
                answers.push(
                    Answer::new(text)
                        .with_span(AnswerSpan { start, end, doc_idx: candidate.doc })
                        .with_score(probs[ci]),
                );
            }
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
