//! Text normalization applied before any compression step.

use std::sync::LazyLock;

use regex::Regex;

static REPEATED_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!{2,}|\?{2,}|,{2,}|;{2,}|:{2,}").unwrap());

static LONG_ELLIPSIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{4,}").unwrap());

static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}\u{2000}-\u{200A}]+").unwrap());

/// Normalize quotes and punctuation runs, then whitespace.
///
/// With `preserve_structure` line breaks survive (runs of blank lines
/// collapse to one); otherwise all whitespace collapses to single spaces.
pub fn preprocess(text: &str, preserve_structure: bool) -> String {
    let text = normalize_quotes(text);
    let text = collapse_punctuation(&text);
    normalize_whitespace(&text, preserve_structure)
}

pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

pub fn collapse_punctuation(text: &str) -> String {
    let text = LONG_ELLIPSIS.replace_all(text, "...");
    REPEATED_PUNCT
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            caps[0].chars().next().map(String::from).unwrap_or_default()
        })
        .into_owned()
}

pub fn normalize_whitespace(text: &str, preserve_structure: bool) -> String {
    if !preserve_structure {
        return text.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true;
    for raw in text.lines() {
        let line = INLINE_SPACE.replace_all(raw, " ");
        let line = line.trim_end();
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(if blank { String::new() } else { line.to_string() });
        previous_blank = blank;
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
