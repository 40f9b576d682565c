//! Typed error hierarchy for the prompt compilation engine.
//!
//! Three enums cover the engine:
//! - `SlotError`: a single per-slot or structural violation
//! - `ExprError`: computed-slot expression parse and evaluation failures
//! - `EngineError`: what the public entry points return
//!
//! Per-slot failures (`ValidationFailed`, `DataSourceFailure`, …) are
//! normally recovered by the slot's own error handling and never leave the
//! resolver. Structural failures are collected into [`Violations`] so the
//! caller sees every problem in one error rather than just the first.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A single slot-level failure or structural violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SlotError {
    #[error("slot '{slot}' is required but has no value and no fallback")]
    MissingRequiredValue { slot: String },

    #[error("cyclic slot dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("slot '{slot}' depends on unknown slot '{dependency}'")]
    UnknownDependency { slot: String, dependency: String },

    #[error("slot '{slot}' failed validation: {reason}")]
    ValidationFailed { slot: String, reason: String },

    #[error("slot '{slot}' transformation failed: {reason}")]
    TransformationFailed { slot: String, reason: String },

    #[error("slot '{slot}' data source failed: {reason}")]
    DataSourceFailure { slot: String, reason: String },

    #[error("slot '{slot}' has an unsupported data source: {detail}")]
    UnsupportedDataSourceType { slot: String, detail: String },
}

impl SlotError {
    /// Structural errors abort the whole request; the rest are recovered
    /// per slot.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredValue { .. }
                | Self::CyclicDependency { .. }
                | Self::UnknownDependency { .. }
        )
    }

    /// The slot this error is about. Cycles report their first node.
    pub fn slot(&self) -> Option<&str> {
        match self {
            Self::MissingRequiredValue { slot }
            | Self::UnknownDependency { slot, .. }
            | Self::ValidationFailed { slot, .. }
            | Self::TransformationFailed { slot, .. }
            | Self::DataSourceFailure { slot, .. }
            | Self::UnsupportedDataSourceType { slot, .. } => Some(slot),
            Self::CyclicDependency { path } => path.first().map(String::as_str),
        }
    }
}

/// Every structural violation found in one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Violations(pub Vec<SlotError>);

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotError> {
        self.0.iter()
    }

    /// Ids of slots reported as missing a required value.
    pub fn missing_slots(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|e| match e {
                SlotError::MissingRequiredValue { slot } => Some(slot.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{} violation(s): {}", self.0.len(), parts.join("; "))
    }
}

/// Errors from the restricted expression evaluator used by computed slots.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: char,
        left: &'static str,
        right: &'static str,
    },
}

/// Errors surfaced by the engine's public entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more structural violations (missing required values in strict
    /// mode, dependency cycles, unknown dependencies).
    #[error("{0}")]
    Structural(Violations),

    #[error("unsupported compression algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("compression rule '{rule}' is invalid: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("export document rejected:\n{}", errors.join("\n"))]
    Import { errors: Vec<String> },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Structural violations carried by this error, if any.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Structural(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Violations> for EngineError {
    fn from(v: Violations) -> Self {
        Self::Structural(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_classification() {
        assert!(SlotError::MissingRequiredValue { slot: "a".into() }.is_structural());
        assert!(SlotError::CyclicDependency { path: vec!["a".into()] }.is_structural());
        assert!(
            !SlotError::DataSourceFailure {
                slot: "a".into(),
                reason: "timeout".into()
            }
            .is_structural()
        );
    }

    #[test]
    fn cycle_message_lists_path() {
        let err = SlotError::CyclicDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic slot dependency: a -> b -> a");
        assert_eq!(err.slot(), Some("a"));
    }

    #[test]
    fn violations_display_lists_every_entry() {
        let v = Violations(vec![
            SlotError::MissingRequiredValue {
                slot: "company".into(),
            },
            SlotError::UnknownDependency {
                slot: "b".into(),
                dependency: "zz".into(),
            },
        ]);
        let msg = EngineError::from(v).to_string();
        assert!(msg.starts_with("2 violation(s)"));
        assert!(msg.contains("company"));
        assert!(msg.contains("zz"));
    }

    #[test]
    fn missing_slots_filters_other_kinds() {
        let v = Violations(vec![
            SlotError::MissingRequiredValue { slot: "x".into() },
            SlotError::CyclicDependency {
                path: vec!["y".into()],
            },
        ]);
        assert_eq!(v.missing_slots(), vec!["x"]);
    }

    #[test]
    fn engine_error_exposes_violations() {
        let err = EngineError::UnsupportedAlgorithm("neural".into());
        assert!(err.violations().is_none());
        assert!(err.to_string().contains("neural"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&SlotError::MissingRequiredValue { slot: "a".into() });
        assert_std_error(&ExprError::DivisionByZero);
        assert_std_error(&EngineError::Import { errors: vec![] });
    }
}
