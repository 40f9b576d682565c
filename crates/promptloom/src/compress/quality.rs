//! Scores how much of the original a compressed text keeps.

use serde::Serialize;

use super::analysis::{
    content_words, list_marker_count, paragraphs, split_sentences, words,
};

const KEYWORD_WEIGHT: f64 = 0.30;
const INTEGRITY_WEIGHT: f64 = 0.25;
const RATIO_WEIGHT: f64 = 0.20;
const READABILITY_WEIGHT: f64 = 0.15;
const STRUCTURE_WEIGHT: f64 = 0.10;

/// Per-factor scores, each in 0..=1. `structure` is `None` when line
/// structure was not requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityBreakdown {
    pub keyword_retention: f64,
    pub semantic_integrity: f64,
    pub ratio_fit: f64,
    pub readability: f64,
    pub structure: Option<f64>,
    pub overall: f64,
}

pub struct QualityInput<'a> {
    pub original: &'a str,
    pub compressed: &'a str,
    pub keywords: &'a [String],
    pub ratio: f64,
    pub target_ratio: f64,
    pub preserve_structure: bool,
}

pub fn score(input: &QualityInput<'_>) -> QualityBreakdown {
    let keyword_retention = keyword_retention(input.compressed, input.keywords);
    let semantic_integrity = semantic_integrity(input.original, input.compressed);
    let ratio_fit = (1.0 - 2.0 * (input.ratio - input.target_ratio).abs()).clamp(0.0, 1.0);
    let readability = readability(input.compressed);
    let structure = input
        .preserve_structure
        .then(|| structure_retention(input.original, input.compressed));

    let weighted = KEYWORD_WEIGHT * keyword_retention
        + INTEGRITY_WEIGHT * semantic_integrity
        + RATIO_WEIGHT * ratio_fit
        + READABILITY_WEIGHT * readability;
    let overall = match structure {
        Some(s) => weighted + STRUCTURE_WEIGHT * s,
        None => weighted / (1.0 - STRUCTURE_WEIGHT),
    };

    QualityBreakdown {
        keyword_retention,
        semantic_integrity,
        ratio_fit,
        readability,
        structure,
        overall: overall.clamp(0.0, 1.0),
    }
}

/// Fraction of keywords still present, case-insensitively.
pub fn keyword_retention(compressed: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 1.0;
    }
    let lower = compressed.to_lowercase();
    let kept = keywords
        .iter()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .count();
    kept as f64 / keywords.len() as f64
}

fn sentence_count(text: &str) -> usize {
    paragraphs(text).iter().map(|p| split_sentences(p).len()).sum()
}

fn semantic_integrity(original: &str, compressed: &str) -> f64 {
    let before = content_words(original);
    if before.is_empty() {
        return 1.0;
    }
    let after = content_words(compressed);
    let overlap = before.intersection(&after).count() as f64 / before.len() as f64;

    let sentences_before = sentence_count(original).max(1) as f64;
    let sentences = (sentence_count(compressed) as f64 / sentences_before).min(1.0);
    (overlap + sentences) / 2.0
}

/// 1.0 inside `[low, high]`, falling off linearly outside it.
fn band(value: f64, low: f64, high: f64) -> f64 {
    if value < low {
        (value / low).clamp(0.0, 1.0)
    } else if value > high {
        (high / value).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn readability(text: &str) -> f64 {
    let tokens = words(text);
    if tokens.is_empty() {
        return 0.0;
    }
    let sentences = sentence_count(text).max(1) as f64;
    let length = band(tokens.len() as f64 / sentences, 8.0, 25.0);

    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count() as f64;
    let density = band(punctuation / tokens.len() as f64, 0.05, 0.35);

    let unique: std::collections::HashSet<&String> = tokens.iter().collect();
    let diversity = unique.len() as f64 / tokens.len() as f64;

    (length + density + diversity) / 3.0
}

fn ratio_of(after: usize, before: usize) -> f64 {
    if before == 0 {
        return 1.0;
    }
    (after as f64 / before as f64).min(1.0)
}

fn structure_retention(original: &str, compressed: &str) -> f64 {
    let paragraphs = ratio_of(paragraphs(compressed).len(), paragraphs(original).len());
    let lists = ratio_of(list_marker_count(compressed), list_marker_count(original));
    (paragraphs + lists) / 2.0
}
