//! Surface-level compression: caller rules, filler words and a dictionary
//! of wordy phrases.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::StepContext;
use crate::error::EngineError;
use crate::model::{CompressionRule, RuleKind};

pub(super) const STEPS: &[super::Step] = &[
    ("syntactic:filler-words", remove_filler_words),
    ("syntactic:phrase-dictionary", shorten_phrases),
];

static FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(really|very|basically|actually|literally|just|quite|simply|totally|definitely|certainly|extremely|somewhat|rather|pretty much)\b,?[ \t]*",
    )
    .unwrap()
});

/// Whether `word` is exactly one of the filler words this module strips.
pub(super) fn is_filler(word: &str) -> bool {
    whole_match(&FILLER, word)
}

pub(super) fn whole_match(re: &Regex, word: &str) -> bool {
    re.captures(word)
        .is_some_and(|caps| caps[1].eq_ignore_ascii_case(word.trim()))
}

const PHRASES: &[(&str, &str)] = &[
    ("it is important to note that", ""),
    ("please note that", ""),
    ("as a matter of fact", ""),
    ("in spite of the fact that", "although"),
    ("due to the fact that", "because"),
    ("at this point in time", "now"),
    ("at the present time", "now"),
    ("in the near future", "soon"),
    ("in the event that", "if"),
    ("for the purpose of", "for"),
    ("has the ability to", "can"),
    ("a large number of", "many"),
    ("with regard to", "about"),
    ("make sure that", "ensure"),
    ("subsequent to", "after"),
    ("in order to", "to"),
    ("is able to", "can"),
    ("prior to", "before"),
];

static PHRASE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    PHRASES
        .iter()
        .map(|(phrase, replacement)| {
            let re = Regex::new(&format!(r"(?i)\b{}\b[ \t]*", regex::escape(phrase))).unwrap();
            (re, *replacement)
        })
        .collect()
});

fn remove_filler_words(text: &str, ctx: &StepContext) -> String {
    FILLER
        .replace_all(text, |caps: &Captures<'_>| {
            if ctx.is_preserved(&caps[1]) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

fn shorten_phrases(text: &str, ctx: &StepContext) -> String {
    let mut out = text.to_string();
    for (re, replacement) in PHRASE_PATTERNS.iter() {
        if !re.is_match(&out) {
            continue;
        }
        let with_space = if replacement.is_empty() {
            String::new()
        } else {
            format!("{replacement} ")
        };
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                if ctx.is_preserved(caps[0].trim()) {
                    caps[0].to_string()
                } else {
                    with_space.clone()
                }
            })
            .into_owned();
    }
    out
}

// ── Caller rules ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct CompiledRule {
    pub id: String,
    pub kind: RuleKind,
    pattern: Regex,
    replacement: String,
}

/// Compile enabled rules in priority order. An invalid pattern, or a
/// `replace` rule without a replacement, rejects the whole strategy.
pub fn compile_rules(rules: &[CompressionRule]) -> Result<Vec<CompiledRule>, EngineError> {
    let mut enabled: Vec<&CompressionRule> = rules.iter().filter(|r| r.enabled).collect();
    enabled.sort_by_key(|r| r.priority);

    enabled
        .into_iter()
        .map(|rule| {
            let pattern = Regex::new(&rule.pattern).map_err(|e| EngineError::InvalidRule {
                rule: rule.id.clone(),
                reason: e.to_string(),
            })?;
            let replacement = match (rule.kind, &rule.replacement) {
                (RuleKind::Replace, None) => {
                    return Err(EngineError::InvalidRule {
                        rule: rule.id.clone(),
                        reason: "replace rule has no replacement".into(),
                    });
                }
                (RuleKind::Replace, Some(r)) => r.clone(),
                _ => String::new(),
            };
            Ok(CompiledRule {
                id: rule.id.clone(),
                kind: rule.kind,
                pattern,
                replacement,
            })
        })
        .collect()
}

/// Apply `remove` and `replace` rules. `merge` and `summarize` are accepted
/// but do nothing and are never reported as applied.
pub fn apply_rules(text: &str, rules: &[CompiledRule], applied: &mut Vec<String>) -> String {
    let mut out = text.to_string();
    for rule in rules {
        match rule.kind {
            RuleKind::Merge | RuleKind::Summarize => {
                debug!("[compress] rule '{}' ({:?}) is not applied", rule.id, rule.kind);
            }
            RuleKind::Remove | RuleKind::Replace => {
                if rule.pattern.is_match(&out) {
                    out = rule
                        .pattern
                        .replace_all(&out, rule.replacement.as_str())
                        .into_owned();
                    applied.push(rule.id.clone());
                }
            }
        }
    }
    out
}

// ── Cleanup ────────────────────────────────────────────────────────

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.;:!?])").unwrap());
static COMMA_BEFORE_STOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;:]+([.!?])").unwrap());
static DANGLING_AFTER_STOP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])[ \t]*[,;:]+").unwrap());
static LEADING_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[,;:]+[ \t]*").unwrap());
static DOUBLE_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",[ \t]*,").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\S)[ \t]{2,}").unwrap());

/// Repair spacing and punctuation left behind by deletions.
pub fn tidy(text: &str) -> String {
    let text = SPACE_BEFORE_PUNCT.replace_all(text, "$1");
    let text = COMMA_BEFORE_STOP.replace_all(&text, "$1");
    let text = DANGLING_AFTER_STOP.replace_all(&text, "$1");
    let text = LEADING_PUNCT.replace_all(&text, "");
    let text = DOUBLE_COMMA.replace_all(&text, ",");
    let text = MULTI_SPACE.replace_all(&text, "$1 ");
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ctx(preserved: &[&str]) -> StepContext {
        StepContext {
            preserved: preserved.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            key_info: Default::default(),
            original: String::new(),
        }
    }

    #[test]
    fn filler_words_are_removed() {
        let out = tidy(&remove_filler_words("This is really very important, basically.", &ctx(&[])));
        assert_eq!(out, "This is important.");
    }

    #[test]
    fn preserved_filler_survives() {
        let out = remove_filler_words("Just do it.", &ctx(&["just"]));
        assert_eq!(out, "Just do it.");
    }

    #[test]
    fn phrase_dictionary() {
        let out = tidy(&shorten_phrases(
            "In order to win, act prior to the deadline due to the fact that time is short.",
            &ctx(&[]),
        ));
        assert_eq!(out, "to win, act before the deadline because time is short.");
    }

    #[test]
    fn rules_apply_in_priority_order() {
        let mut first = CompressionRule::replace("second", "colour", "color");
        first.priority = 2;
        let mut second = CompressionRule::replace("first", "colour", "hue");
        second.priority = 1;
        let rules = compile_rules(&[first, second]).unwrap();
        let mut applied = Vec::new();
        let out = apply_rules("colour me", &rules, &mut applied);
        assert_eq!(out, "hue me");
        assert_eq!(applied, ["first"]);
    }

    #[test]
    fn merge_and_summarize_are_no_ops() {
        let rules = compile_rules(&[
            CompressionRule::new("m", RuleKind::Merge, "a"),
            CompressionRule::new("s", RuleKind::Summarize, "a"),
            CompressionRule::remove("r", r"\s*\(draft\)"),
        ])
        .unwrap();
        let mut applied = Vec::new();
        let out = apply_rules("a plan (draft)", &rules, &mut applied);
        assert_eq!(out, "a plan");
        assert_eq!(applied, ["r"]);
    }

    #[test]
    fn disabled_rules_are_ignored() {
        let mut rule = CompressionRule::remove("off", "(");
        rule.enabled = false;
        assert!(compile_rules(&[rule]).unwrap().is_empty());
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let err = compile_rules(&[CompressionRule::remove("bad", "(")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRule { ref rule, .. } if rule == "bad"));

        let no_replacement = CompressionRule::new("r", RuleKind::Replace, "x");
        assert!(compile_rules(&[no_replacement]).is_err());
    }

    #[test]
    fn tidy_repairs_deletions() {
        assert_eq!(tidy("Well , this  is fine .  , next"), "Well, this is fine. next");
        assert_eq!(tidy(", leading\n  - item  "), "leading\n  - item");
    }
}
