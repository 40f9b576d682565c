//! Convenience re-exports for common `promptloom` types.
//!
//! ```ignore
//! use promptloom::prelude::*;
//! ```
//!
//! Covers compiling, resolving and compressing. Step-level internals
//! (text analysis, quality breakdowns, fetch requests) stay in their
//! modules.

// ── Engine ──────────────────────────────────────────────────────────
pub use crate::compiler::{
    CompileConfig, CompileOptions, PreviewResult, PromptCompiler,
    diagnostics::{Issue, IssueKind, Severity},
    metrics::{Suggestion, SuggestionAction},
};
pub use crate::compress::{CompressOptions, CompressionResult, Compressor};
pub use crate::resolver::{ResolveOptions, ResolvedSlots, SlotResolver};

// ── Records ─────────────────────────────────────────────────────────
pub use crate::model::{
    ApiSource, CachingPolicy, CompressionAlgorithm, CompressionRule, CompressionStrategy,
    ConditionOperator, ConditionalRule, DataSource, ErrorHandling, ErrorStrategy,
    InjectionStrategy, InjectionTiming, SlotDefinition, SlotKind, Template, Transformation,
    ValidationCheck, ValidationRule,
};
pub use crate::value::{SlotValue, SlotValues};

// ── Services & configuration ────────────────────────────────────────
pub use crate::cache::TtlCache;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, SlotError};
pub use crate::export::ConfigExport;
pub use crate::resolver::fetch::{ApiFetcher, HttpFetcher};
