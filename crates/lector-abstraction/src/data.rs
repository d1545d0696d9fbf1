use serde::{Deserialize, Serialize};

/// A question asked against one or more supporting passages.
///
/// `candidates` is only present for multiple-choice style tasks (including
/// entailment, where the candidates are the label set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QASetting {
    /// Stable identifier carried over from the corpus, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub question: String,
    #[serde(default)]
    pub support: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<String>>,
}

impl QASetting {
    #[must_use]
    pub fn new(question: impl Into<String>, support: Vec<String>) -> Self {
        Self { id: None, question: question.into(), support, candidates: None }
    }

    #[must_use]
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = Some(candidates);
        self
    }
}

/// A character half-open range `[start, end)` into one support passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSpan {
    pub start: usize,
    pub end: usize,
    /// Index of the support passage the span points into.
    #[serde(default)]
    pub doc_idx: usize,
}

/// A scored answer, optionally anchored to a span in the support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<AnswerSpan>,
    #[serde(default)]
    pub score: f64,
}

impl Answer {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), span: None, score: 0.0 }
    }

    #[must_use]
    pub fn with_span(mut self, span: AnswerSpan) -> Self {
        self.span = Some(span);
        self
    }

    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

/// One labeled training pair: a question setting and its gold answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInstance {
    pub setting: QASetting,
    pub answers: Vec<Answer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_serde_round_trip() {
        let setting = QASetting::new("who?", vec!["Ada Lovelace wrote it.".to_string()])
            .with_candidates(vec!["Ada".to_string(), "Babbage".to_string()]);
        let json = serde_json::to_string(&setting).unwrap();
        let back: QASetting = serde_json::from_str(&json).unwrap();
        assert_eq!(setting, back);
    }

    #[test]
    fn test_answer_builder() {
        let answer = Answer::new("Ada")
            .with_span(AnswerSpan { start: 0, end: 3, doc_idx: 0 })
            .with_score(0.9);
        assert_eq!(answer.span.unwrap().end, 3);
        assert!((answer.score - 0.9).abs() < f64::EPSILON);
    }
}
