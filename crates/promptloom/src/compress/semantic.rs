//! Meaning-aware compression: hedging removal, near-duplicate sentence
//! merging, long-sentence tightening and `keyword: context` re-insertion.
//!
//! Every step works line by line so line structure survives.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{StepContext, syntactic};
use super::analysis::{content_words, split_sentences, words};

pub(super) const STEPS: &[super::Step] = &[
    ("semantic:hedging", remove_hedging),
    ("semantic:merge-similar", merge_similar_sentences),
    ("semantic:long-sentences", tighten_long_sentences),
];

/// Sentences more similar than this are merged.
const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Sentences with more words than this are tightened.
const LONG_SENTENCE_WORDS: usize = 25;

static HEDGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(I think|I believe|I feel|it seems(?: that)?|it appears(?: that)?|perhaps|maybe|possibly|probably|kind of|sort of|more or less|in my opinion|to some extent|arguably)\b,?[ \t]*",
    )
    .unwrap()
});

static CONNECTIVES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(furthermore|moreover|additionally|in addition|however|therefore|consequently|nevertheless|also|indeed|highly|essentially)\b,?[ \t]*",
    )
    .unwrap()
});

fn strip_unless_preserved(re: &Regex, text: &str, ctx: &StepContext) -> String {
    re.replace_all(text, |caps: &Captures<'_>| {
        if ctx.is_preserved(&caps[1]) {
            caps[0].to_string()
        } else {
            String::new()
        }
    })
    .into_owned()
}

fn remove_hedging(text: &str, ctx: &StepContext) -> String {
    strip_unless_preserved(&HEDGING, text, ctx)
}

fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    text.lines().map(f).collect::<Vec<_>>().join("\n")
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Within each line, drop the shorter of two near-duplicate sentences.
/// A sentence marked important is never dropped.
fn merge_similar_sentences(text: &str, ctx: &StepContext) -> String {
    map_lines(text, |line| {
        let mut kept: Vec<(String, HashSet<String>)> = Vec::new();
        for sentence in split_sentences(line) {
            let concepts = content_words(&sentence);
            let similar = kept
                .iter()
                .position(|(_, other)| jaccard(&concepts, other) > SIMILARITY_THRESHOLD);
            match similar {
                None => kept.push((sentence, concepts)),
                Some(j) => {
                    let incoming_longer =
                        sentence.chars().count() > kept[j].0.chars().count();
                    if incoming_longer && !ctx.key_info.is_important(&kept[j].0) {
                        kept[j] = (sentence, concepts);
                    } else if !incoming_longer && !ctx.key_info.is_important(&sentence) {
                        // dropped
                    } else {
                        kept.push((sentence, concepts));
                    }
                }
            }
        }
        kept.into_iter()
            .map(|(s, _)| s)
            .collect::<Vec<_>>()
            .join(" ")
    })
}

fn tighten_long_sentences(text: &str, ctx: &StepContext) -> String {
    map_lines(text, |line| {
        split_sentences(line)
            .into_iter()
            .map(|sentence| {
                if words(&sentence).len() > LONG_SENTENCE_WORDS {
                    strip_unless_preserved(&CONNECTIVES, &sentence, ctx)
                } else {
                    sentence
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    })
}

/// Words kept on each side of a keyword in a re-inserted fragment.
const CONTEXT_WORDS: usize = 3;

/// Whether a step removes `keyword` on purpose, so putting it back would
/// undo that step.
fn is_stripped_on_purpose(keyword: &str) -> bool {
    syntactic::is_filler(keyword)
        || syntactic::whole_match(&HEDGING, keyword)
        || syntactic::whole_match(&CONNECTIVES, keyword)
}

/// `keyword: <up to CONTEXT_WORDS words either side of it in sentence>.`
fn keyword_fragment(keyword: &str, sentence: &str) -> String {
    let tokens: Vec<&str> = sentence.split_whitespace().collect();
    let head = keyword.split_whitespace().next().unwrap_or(keyword);
    let at = tokens
        .iter()
        .position(|t| t.to_lowercase().contains(head))
        .unwrap_or(0);
    let from = at.saturating_sub(CONTEXT_WORDS);
    let to = (at + CONTEXT_WORDS + 1).min(tokens.len());
    let context = tokens[from..to].join(" ");
    let context = context.trim_end_matches(|c: char| c.is_ascii_punctuation());
    format!("{keyword}: {context}.")
}

/// Append a short `keyword: context` fragment for every keyword that
/// compression removed, as long as the text stays shorter than `budget`
/// characters. Filler, hedging and connective keywords stay removed.
/// Returns whether anything was re-inserted.
pub fn reinsert_keywords(text: &mut String, ctx: &StepContext, budget: usize) -> bool {
    let mut changed = false;
    for keyword in &ctx.key_info.keywords {
        if text.to_lowercase().contains(keyword.as_str()) || is_stripped_on_purpose(keyword) {
            continue;
        }
        let Some(source) = ctx
            .original
            .lines()
            .flat_map(split_sentences)
            .find(|s| s.to_lowercase().contains(keyword.as_str()))
        else {
            continue;
        };
        let fragment = keyword_fragment(keyword, &source);
        let separator = if text.is_empty() { "" } else { " " };
        let candidate_len = text.chars().count() + separator.len() + fragment.chars().count();
        if candidate_len < budget {
            text.push_str(separator);
            text.push_str(&fragment);
            changed = true;
        }
    }
    changed
}
