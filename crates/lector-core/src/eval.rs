//! Answer evaluation: exact match and token-level F1.

use crate::reader::Reader;
use lector_abstraction::{QASetting, ReaderResult, TrainingInstance};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub exact_match: f64,
    pub f1: f64,
    /// Number of scored instances (those with at least one gold answer).
    pub count: usize,
}

/// Lowercases, strips punctuation and articles, and collapses whitespace.
#[must_use]
pub fn normalize_answer(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| !matches!(*t, "a" | "an" | "the"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub fn exact_match(prediction: &str, gold: &str) -> bool {
    normalize_answer(prediction) == normalize_answer(gold)
}

/// Token-bag F1 between a predicted and a gold answer string.
#[must_use]
pub fn f1_score(prediction: &str, gold: &str) -> f64 {
    let pred_tokens: Vec<String> =
        normalize_answer(prediction).split_whitespace().map(String::from).collect();
    let gold_tokens: Vec<String> =
        normalize_answer(gold).split_whitespace().map(String::from).collect();

    if pred_tokens.is_empty() && gold_tokens.is_empty() {
        return 1.0;
    }
    if pred_tokens.is_empty() || gold_tokens.is_empty() {
        return 0.0;
    }

    let mut gold_counts: HashMap<&str, usize> = HashMap::new();
    for token in &gold_tokens {
        *gold_counts.entry(token).or_default() += 1;
    }
    let mut common = 0usize;
    for token in &pred_tokens {
        if let Some(count) = gold_counts.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }
    if common == 0 {
        return 0.0;
    }
    let precision = common as f64 / pred_tokens.len() as f64;
    let recall = common as f64 / gold_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Runs the reader over labeled data and averages exact match and F1
/// of the top answer against the best-matching gold answer.
pub fn evaluate(
    reader: &Reader,
    data: &[TrainingInstance],
    batch_size: usize,
) -> ReaderResult<EvalSummary> {
    let settings: Vec<QASetting> = data.iter().map(|i| i.setting.clone()).collect();

    let mut em_sum = 0.0;
    let mut f1_sum = 0.0;
    let mut count = 0usize;
    for (instance, result) in data.iter().zip(reader.answers_iter(&settings, batch_size)) {
        let answers = result?;
        if instance.answers.is_empty() {
            continue;
        }
        let prediction = answers.first().map_or("", |a| a.text.as_str());
        let best_em = instance
            .answers
            .iter()
            .map(|gold| f64::from(u8::from(exact_match(prediction, &gold.text))))
            .fold(0.0, f64::max);
        let best_f1 = instance
            .answers
            .iter()
            .map(|gold| f1_score(prediction, &gold.text))
            .fold(0.0, f64::max);
        em_sum += best_em;
        f1_sum += best_f1;
        count += 1;
    }

    if count == 0 {
        return Ok(EvalSummary { exact_match: 0.0, f1: 0.0, count: 0 });
    }
    Ok(EvalSummary {
        exact_match: em_sum / count as f64,
        f1: f1_sum / count as f64,
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_articles_and_punctuation() {
        assert_eq!(normalize_answer("The  Ada Lovelace!"), "ada lovelace");
        assert_eq!(normalize_answer("an answer, truly"), "answer truly");
    }

    #[test]
    fn test_exact_match_after_normalization() {
        assert!(exact_match("the answer", "Answer"));
        assert!(!exact_match("answer", "question"));
    }

    #[test]
    fn test_f1_overlap() {
        assert!((f1_score("ada lovelace", "ada lovelace") - 1.0).abs() < 1e-9);
        assert!((f1_score("ada", "ada lovelace") - (2.0 / 3.0)).abs() < 1e-9);
        assert!((f1_score("grace hopper", "ada lovelace")).abs() < 1e-9);
        assert!((f1_score("", "") - 1.0).abs() < 1e-9);
        assert!((f1_score("x", "")).abs() < 1e-9);
    }
}
