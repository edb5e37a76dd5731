//! Extractive summarization with a fallback.
//!
//! [`summarize`] scores each sentence by the frequency of its content words
//! and keeps the best fifth of them in their original order. It refuses text
//! with fewer than two sentences; [`summarize_or`] then falls back to a
//! summary supplied by the caller.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Share of sentences kept in a summary.
pub const SUMMARY_RATIO: f64 = 0.2;

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("sentence regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("word regex"));

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "i", "in", "is", "it", "its", "of", "on", "or", "she", "that", "the", "their",
    "they", "this", "to", "was", "were", "will", "with", "would",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("no text to summarize")]
    Empty,
    #[error("text has {0} sentence(s); at least two are needed")]
    TooShort(usize),
}

/// Split text into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        let sentence = text[start..boundary.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn content_words(sentence: &str) -> impl Iterator<Item = String> + '_ {
    WORD.find_iter(sentence)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
}

/// Primary summarizer.
pub fn summarize(text: &str) -> Result<String, SummaryError> {
    let sentences = split_sentences(text);
    match sentences.len() {
        0 => return Err(SummaryError::Empty),
        1 => return Err(SummaryError::TooShort(1)),
        _ => {}
    }

    let mut frequency: HashMap<String, usize> = HashMap::new();
    for sentence in &sentences {
        for word in content_words(sentence) {
            *frequency.entry(word).or_default() += 1;
        }
    }

    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let words: Vec<String> = content_words(sentence).collect();
            let total: usize = words.iter().map(|w| frequency[w]).sum();
            let score = if words.is_empty() {
                0.0
            } else {
                total as f64 / words.len() as f64
            };
            (i, score)
        })
        .collect();

    let keep = ((sentences.len() as f64 * SUMMARY_RATIO).ceil() as usize).max(1);
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut chosen: Vec<usize> = scored.into_iter().take(keep).map(|(i, _)| i).collect();
    chosen.sort_unstable();

    debug!(sentences = sentences.len(), kept = keep, "Summarized text");
    Ok(chosen
        .into_iter()
        .map(|i| sentences[i])
        .collect::<Vec<_>>()
        .join(" "))
}

/// Summarize `text`, or return `fallback()` when the primary summarizer
/// cannot handle it.
pub fn summarize_or(text: &str, fallback: impl FnOnce() -> String) -> String {
    match summarize(text) {
        Ok(summary) => summary,
        Err(e) => {
            debug!(error = %e, "Primary summarizer failed; using fallback summary");
            fallback()
        }
    }
}

/// The first `n` sentences of `text`, used when a page has no description.
pub fn lead(text: &str, n: usize) -> String {
    split_sentences(text)
        .into_iter()
        .take(n)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "The council approved the new transit budget on Monday. \
        The budget adds two bus lines and extends rail service. \
        Critics said the transit budget ignores rural riders. \
        Weather was mild. \
        Officials expect the bus lines to open next spring. \
        The vote was seven to two.";

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("One. Two! Three? \"Four.\" Five");
        assert_eq!(s, vec!["One.", "Two!", "Three?", "\"Four.\"", "Five"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_summary_keeps_a_fifth_in_order() {
        let summary = summarize(TEXT).unwrap();
        let picked = split_sentences(&summary);
        assert_eq!(picked.len(), 2);
        let all = split_sentences(TEXT);
        let positions: Vec<usize> = picked
            .iter()
            .map(|p| all.iter().position(|s| s == p).unwrap())
            .collect();
        assert!(positions[0] < positions[1]);
        assert!(!summary.contains("Weather was mild."));
    }

    #[test]
    fn test_single_sentence_is_rejected() {
        assert_eq!(summarize("Just one sentence."), Err(SummaryError::TooShort(1)));
        assert_eq!(summarize(""), Err(SummaryError::Empty));
    }

    #[test]
    fn test_fallback_chain() {
        let s = summarize_or("Only this.", || "built-in".to_string());
        assert_eq!(s, "built-in");
        let s = summarize_or(TEXT, || "built-in".to_string());
        assert_ne!(s, "built-in");
    }

    #[test]
    fn test_lead() {
        assert_eq!(lead(TEXT, 1), "The council approved the new transit budget on Monday.");
    }
}
