//! Compile-time issues. Issues are reported, never raised.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::SlotError;
use crate::model::{ErrorStrategy, SlotDefinition, SlotKind};
use crate::resolver::SlotFallback;
use crate::value::SlotValues;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    MissingRequiredValue,
    UnresolvedPlaceholder,
    EmptyCompiledOutput,
    OversizedCompiledOutput,
    CompressionFailed,
    SlotFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    /// What to change to make the issue go away.
    pub hint: String,
}

impl Issue {
    pub fn missing_required(slot: &str) -> Self {
        Self {
            kind: IssueKind::MissingRequiredValue,
            severity: Severity::Error,
            message: format!("required slot '{slot}' has no value"),
            slot: Some(slot.to_string()),
            hint: "provide a value, a defaultValue or an errorHandling.fallbackValue".into(),
        }
    }

    pub fn unresolved(placeholder: &str) -> Self {
        Self {
            kind: IssueKind::UnresolvedPlaceholder,
            severity: Severity::Warning,
            message: format!("placeholder {{{{{placeholder}}}}} was not replaced"),
            slot: Some(placeholder.to_string()),
            hint: "declare a slot with this name or give the slot a value".into(),
        }
    }

    pub fn empty_output() -> Self {
        Self {
            kind: IssueKind::EmptyCompiledOutput,
            severity: Severity::Error,
            message: "compiled prompt is empty".into(),
            slot: None,
            hint: "check the template's basePrompt and the slot values".into(),
        }
    }

    pub fn oversized(chars: usize, limit: usize) -> Self {
        Self {
            kind: IssueKind::OversizedCompiledOutput,
            severity: Severity::Warning,
            message: format!("compiled prompt is {chars} characters, above {limit}"),
            slot: None,
            hint: "enable compression or shorten the template".into(),
        }
    }

    pub fn compression_failed(reason: impl std::fmt::Display) -> Self {
        Self {
            kind: IssueKind::CompressionFailed,
            severity: Severity::Warning,
            message: format!("compression failed, output left uncompressed: {reason}"),
            slot: None,
            hint: "fix the compression strategy's rules or algorithm".into(),
        }
    }

    pub fn fallback(fallback: &SlotFallback) -> Self {
        Self {
            kind: IssueKind::SlotFallback,
            severity: Severity::Info,
            message: format!(
                "slot '{}' used its {:?} handling: {}",
                fallback.slot, fallback.strategy, fallback.reason
            ),
            slot: Some(fallback.slot.clone()),
            hint: "check the slot's data source".into(),
        }
    }
}

/// Whether `slot` can get a value without reaching its data source.
fn has_resolvable_value(slot: &SlotDefinition, values: &SlotValues) -> bool {
    if slot.error_handling.strategy == ErrorStrategy::Skip
        || slot.default_value.is_some()
        || slot.error_handling.fallback_value.is_some()
    {
        return true;
    }
    match slot.kind {
        SlotKind::User => values.get(&slot.id).is_some_and(|v| !v.is_empty()),
        SlotKind::System => true,
        SlotKind::Conditional => !slot.conditions.is_empty(),
        SlotKind::Api | SlotKind::Computed => slot.data_source.is_some(),
    }
}

/// Every required slot without a resolvable value, in declaration order.
pub fn missing_required(slots: &[SlotDefinition], values: &SlotValues) -> Vec<SlotError> {
    slots
        .iter()
        .filter(|slot| slot.required && !has_resolvable_value(slot, values))
        .map(|slot| SlotError::MissingRequiredValue {
            slot: slot.id.clone(),
        })
        .collect()
}

/// Placeholder names still present in `text`, first occurrence order.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(text) {
        let name = caps[1].trim().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Empty and oversized output checks.
pub fn output_issues(text: &str, max_chars: usize) -> Vec<Issue> {
    let chars = text.chars().count();
    if text.trim().is_empty() {
        vec![Issue::empty_output()]
    } else if chars > max_chars {
        vec![Issue::oversized(chars, max_chars)]
    } else {
        Vec::new()
    }
}
