//! Heuristic text statistics: sentences, keywords, complexity and the key
//! information compression must not lose.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Rough characters-per-token ratio used for every token estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// `ceil(chars / 4)`; a documented approximation, not a tokenizer.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Cue words that mark a sentence as carrying requirements.
const CUE_WORDS: &[&str] = &[
    "must", "important", "key", "critical", "required", "require", "requires", "note", "always",
    "never", "ensure", "essential",
];

static QUOTED_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\n]{2,80})""#).unwrap());

static CUE_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:must|important(?:ly)?|including|required)\b[^.!?\n]{0,60}").unwrap()
});

static PROPER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").unwrap());

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap());

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?%?").unwrap());

/// Lowercased word tokens. Apostrophes stay inside words.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Words that are not stop words and have at least three characters.
pub fn content_words(text: &str) -> HashSet<String> {
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() >= 3 && !is_stop_word(w))
        .collect()
}

/// Split one paragraph into sentences. A sentence ends at `.`, `!` or `?`
/// followed by whitespace or the end of the text.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Non-empty lines separated by blank lines.
pub fn paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lines starting with a bullet or an ordinal marker.
pub fn list_marker_count(text: &str) -> usize {
    text.lines()
        .map(str::trim_start)
        .filter(|line| {
            line.starts_with("- ")
                || line.starts_with("* ")
                || line.starts_with("• ")
                || line
                    .split_once(['.', ')'])
                    .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .count()
}

/// Top `limit` content words by frequency; ties keep first occurrence.
pub fn keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, word) in words(text).into_iter().enumerate() {
        if word.chars().count() <= 3 || is_stop_word(&word) || word.chars().all(char::is_numeric) {
            continue;
        }
        counts.entry(word).or_insert((0, position)).0 += 1;
    }
    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(w, (count, first))| (w, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(limit).map(|(w, _, _)| w).collect()
}

/// 0..1 score combining sentence length, lexical diversity, punctuation
/// density and parenthetical nesting.
pub fn complexity(text: &str) -> f64 {
    let all_words = words(text);
    if all_words.is_empty() {
        return 0.0;
    }
    let sentence_count = paragraphs(text)
        .iter()
        .map(|p| split_sentences(p).len())
        .sum::<usize>()
        .max(1);
    let avg_len = all_words.len() as f64 / sentence_count as f64;
    let unique: HashSet<&String> = all_words.iter().collect();
    let diversity = unique.len() as f64 / all_words.len() as f64;
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count() as f64;
    let density = punctuation / all_words.len() as f64;

    let mut depth = 0usize;
    let mut max_depth = 0usize;
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    let score = 0.35 * (avg_len / 30.0).min(1.0)
        + 0.25 * diversity
        + 0.20 * (density / 0.5).min(1.0)
        + 0.20 * (max_depth as f64 / 3.0).min(1.0);
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysis {
    pub sentences: usize,
    pub paragraphs: usize,
    pub words: usize,
    pub keywords: Vec<String>,
    pub complexity: f64,
}

pub fn analyze(text: &str) -> TextAnalysis {
    let paras = paragraphs(text);
    TextAnalysis {
        sentences: paras.iter().map(|p| split_sentences(p).len()).sum(),
        paragraphs: paras.len(),
        words: words(text).len(),
        keywords: keywords(text, 10),
        complexity: complexity(text),
    }
}

/// What compression should keep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyInformation {
    /// Frequency keywords plus caller-preserved keywords, lowercased.
    pub keywords: Vec<String>,
    pub key_phrases: Vec<String>,
    pub important_sentences: Vec<String>,
    pub entities: Vec<String>,
}

impl KeyInformation {
    pub fn is_important(&self, sentence: &str) -> bool {
        self.important_sentences.iter().any(|s| s == sentence)
    }
}

pub fn extract_key_information(
    text: &str,
    analysis: &TextAnalysis,
    preserve: &[String],
) -> KeyInformation {
    let mut keywords = analysis.keywords.clone();
    for kw in preserve {
        let kw = kw.to_lowercase();
        if !kw.is_empty() && !keywords.contains(&kw) {
            keywords.push(kw);
        }
    }

    let mut key_phrases: Vec<String> = QUOTED_SPAN
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    key_phrases.extend(CUE_PHRASE.find_iter(text).map(|m| m.as_str().trim().to_string()));
    dedup(&mut key_phrases);

    let sentences: Vec<String> = paragraphs(text)
        .iter()
        .flat_map(|p| split_sentences(p))
        .collect();
    let last = sentences.len().saturating_sub(1);
    let important_sentences = sentences
        .iter()
        .enumerate()
        .filter(|(i, s)| sentence_importance(s, *i == 0 || *i == last, &keywords) >= 3)
        .map(|(_, s)| s.clone())
        .collect();

    let mut entities: Vec<String> = PROPER_NAME
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|name| !is_stop_word(&name.to_lowercase()))
        .map(str::to_string)
        .collect();
    entities.extend(DATE.find_iter(text).map(|m| m.as_str().to_string()));
    entities.extend(NUMBER.find_iter(text).map(|m| m.as_str().to_string()));
    dedup(&mut entities);

    KeyInformation {
        keywords,
        key_phrases,
        important_sentences,
        entities,
    }
}

fn sentence_importance(sentence: &str, edge: bool, keywords: &[String]) -> usize {
    let tokens = words(sentence);
    let mut score = 0;
    if tokens.iter().any(|w| CUE_WORDS.contains(&w.as_str())) {
        score += 2;
    }
    if edge {
        score += 1;
    }
    if (8..=30).contains(&tokens.len()) {
        score += 1;
    }
    if sentence.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }
    score += tokens.iter().filter(|w| keywords.contains(w)).count().min(2);
    score
}

fn dedup(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("héllo"), 2);
    }

    #[test]
    fn sentence_splitting() {
        let s = split_sentences("First one. Second? Third! v1.2 is out. trailing");
        assert_eq!(s, ["First one.", "Second?", "Third!", "v1.2 is out.", "trailing"]);
    }

    #[test]
    fn keywords_rank_by_frequency() {
        let text = "Rust compilers check ownership. Ownership rules keep memory safe. Rust is fast.";
        let kws = keywords(text, 2);
        assert_eq!(kws, ["rust", "ownership"]);
    }

    #[test]
    fn complexity_is_bounded() {
        let simple = complexity("The cat sat.");
        let dense = complexity(
            "Notwithstanding (as previously (and repeatedly) discussed) the constraints; \
             implementation, verification, deployment: all interdependent!",
        );
        assert!((0.0..=1.0).contains(&simple));
        assert!(dense > simple);
    }

    #[test]
    fn list_markers() {
        assert_eq!(list_marker_count("- a\n* b\n1. c\n2) d\nplain"), 4);
    }

    #[test]
    fn key_information() {
        let text = "You must cite \"primary sources\" for every claim. \
                    Alice Johnson reviewed the 2024-05-01 draft. Keep it short.";
        let analysis = analyze(text);
        let info = extract_key_information(text, &analysis, &["Brevity".to_string()]);
        assert!(info.keywords.contains(&"brevity".to_string()));
        assert!(info.key_phrases.contains(&"primary sources".to_string()));
        assert!(info.entities.contains(&"Alice Johnson".to_string()));
        assert!(info.entities.contains(&"2024-05-01".to_string()));
        assert!(info.is_important("You must cite \"primary sources\" for every claim."));
    }
}
