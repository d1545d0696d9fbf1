use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+|[^\w\s]").expect("token pattern is valid")
});

/// A surface token with its character range in the source text.
///
/// Offsets are character offsets, not byte offsets, matching the span
/// convention of the corpus format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Splits `text` into word and punctuation tokens with character offsets.
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut byte_cursor = 0;
    let mut char_cursor = 0;
    for m in TOKEN_RE.find_iter(text) {
        char_cursor += text[byte_cursor..m.start()].chars().count();
        let len = m.as_str().chars().count();
        tokens.push(Token {
            text: m.as_str().to_string(),
            start: char_cursor,
            end: char_cursor + len,
        });
        char_cursor += len;
        byte_cursor = m.end();
    }
    tokens
}

/// Character-offset slice `[start, end)` of `text`.
#[must_use]
pub fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_words_and_punctuation() {
        let tokens = tokenize("Ada wrote it, didn't she?");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Ada", "wrote", "it", ",", "didn", "'", "t", "she", "?"]);
    }

    #[test]
    fn test_offsets_are_char_offsets() {
        let text = "héllo wörld";
        let tokens = tokenize(text);
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 5);
        assert_eq!(tokens[1].start, 6);
        assert_eq!(char_slice(text, tokens[1].start, tokens[1].end), "wörld");
    }

    #[test]
    fn test_char_slice_clamps() {
        assert_eq!(char_slice("abc", 1, 2), "b");
        assert_eq!(char_slice("abc", 2, 1), "");
        assert_eq!(char_slice("abc", 1, 99), "bc");
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("   ").is_empty());
    }
}
