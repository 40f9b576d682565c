//! Injection and compression strategies.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ── Injection ──────────────────────────────────────────────────────

/// When slot values are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum InjectionTiming {
    /// Resolve every slot of the template.
    #[default]
    Immediate,
    /// Resolve only slots the template text references, plus their
    /// transitive dependencies.
    Lazy,
    /// Like `immediate`, with per-slot caching forced on.
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotPriority {
    pub slot_id: String,
    /// Lower is earlier.
    pub priority: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceBudget {
    /// Hard per-call deadline for API slots.
    pub timeout_ms: u64,
    pub retry_count: u32,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retry_count: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct InjectionStrategy {
    pub timing: InjectionTiming,
    pub order: Vec<SlotPriority>,
    pub performance: PerformanceBudget,
}

impl InjectionStrategy {
    pub fn with_timing(mut self, timing: InjectionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_priority(mut self, slot_id: impl Into<String>, priority: u32) -> Self {
        self.order.push(SlotPriority {
            slot_id: slot_id.into(),
            priority,
        });
        self
    }

    pub fn with_performance(mut self, timeout_ms: u64, retry_count: u32) -> Self {
        self.performance = PerformanceBudget {
            timeout_ms,
            retry_count,
        };
        self
    }

    /// Priority of a slot; unlisted slots sort last.
    pub fn priority_of(&self, slot_id: &str) -> u32 {
        self.order
            .iter()
            .find(|p| p.slot_id == slot_id)
            .map_or(u32::MAX, |p| p.priority)
    }
}

// ── Compression ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CompressionAlgorithm {
    Semantic,
    Syntactic,
    #[default]
    Hybrid,
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressionAlgorithm::Semantic => "semantic",
            CompressionAlgorithm::Syntactic => "syntactic",
            CompressionAlgorithm::Hybrid => "hybrid",
        })
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "syntactic" => Ok(Self::Syntactic),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(EngineError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionConfig {
    /// Token budget. Input already within it is returned unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Target compressed/original length ratio in `(0, 1]`.
    pub compression_ratio: f64,
    pub quality_threshold: f64,
    pub preserve_keywords: Vec<String>,
    pub preserve_structure: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            compression_ratio: 0.7,
            quality_threshold: 0.7,
            preserve_keywords: Vec::new(),
            preserve_structure: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// Delete every match of the pattern.
    Remove,
    /// Replace every match with `replacement`.
    Replace,
    /// Accepted but not applied.
    Merge,
    /// Accepted but not applied.
    Summarize,
}

/// A caller-declared regex rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressionRule {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Rules run in ascending priority, then declaration order.
    #[serde(default)]
    pub priority: u32,
}

fn enabled_by_default() -> bool {
    true
}

impl CompressionRule {
    pub fn new(id: impl Into<String>, kind: RuleKind, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            pattern: pattern.into(),
            replacement: None,
            enabled: true,
            priority: 0,
        }
    }

    pub fn remove(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(id, RuleKind::Remove, pattern)
    }

    pub fn replace(
        id: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            replacement: Some(replacement.into()),
            ..Self::new(id, RuleKind::Replace, pattern)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    /// Fraction of the gap between target ratio and 1.0 given back on retry.
    pub learning_rate: f64,
    /// Samples required before a trend is reported.
    pub min_samples: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            learning_rate: 0.5,
            min_samples: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompressionStrategy {
    /// Key for the per-strategy learning history.
    #[serde(default = "default_strategy_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub algorithm: CompressionAlgorithm,
    #[serde(default)]
    pub config: CompressionConfig,
    #[serde(default)]
    pub rules: Vec<CompressionRule>,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
}

fn default_strategy_id() -> String {
    "default".to_string()
}

impl Default for CompressionStrategy {
    fn default() -> Self {
        Self {
            id: default_strategy_id(),
            name: None,
            algorithm: CompressionAlgorithm::default(),
            config: CompressionConfig::default(),
            rules: Vec::new(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

impl CompressionStrategy {
    pub fn new(id: impl Into<String>, algorithm: CompressionAlgorithm) -> Self {
        Self {
            id: id.into(),
            algorithm,
            ..Self::default()
        }
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.config.compression_ratio = ratio;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.config.quality_threshold = threshold;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn preserving<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .preserve_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_structure(mut self) -> Self {
        self.config.preserve_structure = true;
        self
    }

    pub fn with_rule(mut self, rule: CompressionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn adaptive(mut self, learning_rate: f64) -> Self {
        self.adaptive.enabled = true;
        self.adaptive.learning_rate = learning_rate;
        self
    }
}
