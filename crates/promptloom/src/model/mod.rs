//! Input records: templates, slot definitions and strategies.

mod slot;
mod strategy;
mod template;

pub use slot::{
    ApiSource, CachingPolicy, ConditionOperator, ConditionalRule, DataSource, ErrorHandling,
    ErrorStrategy, HttpMethod, ResponseExtraction, SlotDefinition, SlotKind, Transformation,
    ValidationCheck, ValidationRule,
};
pub use strategy::{
    AdaptiveConfig, CompressionAlgorithm, CompressionConfig, CompressionRule, CompressionStrategy,
    InjectionStrategy, InjectionTiming, PerformanceBudget, RuleKind, SlotPriority,
};
pub use template::Template;
