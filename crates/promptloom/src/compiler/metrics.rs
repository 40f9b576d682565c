//! Cost, latency and quality estimates for a compiled prompt, plus the
//! advisory suggestions derived from them.
//!
//! Token counts use the same `ceil(chars / 4)` approximation as the
//! compressor. They are estimates for budgeting, not tokenizer output.

use serde::Serialize;

use crate::compress::analysis::{complexity, estimate_tokens};
use crate::config::EngineConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    /// Tokens before compression.
    pub uncompressed_tokens: usize,
    pub tokens_saved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub estimated_cost: f64,
    pub unit_cost_per_1k: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEstimate {
    pub compile_ms: u64,
    pub estimated_response_ms: f64,
}

/// Composite prompt quality: `0.4 clarity + 0.3 relevance + 0.3 completeness`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityEstimate {
    /// Inverse of text complexity.
    pub clarity: f64,
    /// Share of referenced slots that received a value.
    pub relevance: f64,
    /// Share of template placeholders that were filled.
    pub completeness: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewMetrics {
    pub token_usage: TokenUsage,
    pub cost: CostEstimate,
    pub time: TimeEstimate,
    pub quality: QualityEstimate,
}

impl PreviewMetrics {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "~{} tokens (saved {}), ${:.5}, ~{:.0}ms response, quality {:.2}",
            self.token_usage.prompt_tokens,
            self.token_usage.tokens_saved,
            self.cost.estimated_cost,
            self.time.estimated_response_ms,
            self.quality.overall,
        )
    }
}

/// Counts the quality estimate is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coverage {
    pub referenced_slots: usize,
    pub resolved_slots: usize,
    pub placeholders: usize,
    pub unresolved_placeholders: usize,
}

fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        1.0
    } else {
        (part as f64 / whole as f64).clamp(0.0, 1.0)
    }
}

pub fn cost(tokens: usize, config: &EngineConfig) -> f64 {
    tokens as f64 / 1000.0 * config.unit_cost_per_1k
}

pub fn latency_ms(tokens: usize, config: &EngineConfig) -> f64 {
    config.base_latency_ms + config.latency_per_token_ms * tokens as f64
}

pub fn quality(text: &str, coverage: &Coverage) -> QualityEstimate {
    if text.trim().is_empty() {
        return QualityEstimate {
            clarity: 0.0,
            relevance: 0.0,
            completeness: 0.0,
            overall: 0.0,
        };
    }
    let clarity = 1.0 - 0.5 * complexity(text);
    let relevance = share(coverage.resolved_slots, coverage.referenced_slots);
    let filled = coverage
        .placeholders
        .saturating_sub(coverage.unresolved_placeholders);
    let completeness = share(filled, coverage.placeholders);
    QualityEstimate {
        clarity,
        relevance,
        completeness,
        overall: 0.4 * clarity + 0.3 * relevance + 0.3 * completeness,
    }
}

pub fn measure(
    text: &str,
    uncompressed_tokens: usize,
    compile_ms: u64,
    coverage: &Coverage,
    config: &EngineConfig,
) -> PreviewMetrics {
    let prompt_tokens = estimate_tokens(text);
    PreviewMetrics {
        token_usage: TokenUsage {
            prompt_tokens,
            uncompressed_tokens,
            tokens_saved: uncompressed_tokens.saturating_sub(prompt_tokens),
        },
        cost: CostEstimate {
            estimated_cost: cost(prompt_tokens, config),
            unit_cost_per_1k: config.unit_cost_per_1k,
        },
        time: TimeEstimate {
            compile_ms,
            estimated_response_ms: latency_ms(prompt_tokens, config),
        },
        quality: quality(text, coverage),
    }
}

// ── Suggestions ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionKind {
    EnableCompression,
    AddExamples,
    EnableCaching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// How a suggestion can be acted on. `Auto` carries a partial request
/// document the caller may merge in; nothing is ever applied here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SuggestionAction {
    Auto { change: serde_json::Value },
    Manual { instruction: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub message: String,
    pub impact: Impact,
    pub action: SuggestionAction,
}

pub fn suggestions(
    metrics: &PreviewMetrics,
    compression_requested: bool,
    config: &EngineConfig,
) -> Vec<Suggestion> {
    let mut out = Vec::new();
    let tokens = metrics.token_usage.prompt_tokens;

    if tokens > config.token_high_water && !compression_requested {
        out.push(Suggestion {
            kind: SuggestionKind::EnableCompression,
            message: format!(
                "prompt is ~{tokens} tokens, above {}; compression would cut cost",
                config.token_high_water
            ),
            impact: Impact::High,
            action: SuggestionAction::Auto {
                change: serde_json::json!({
                    "compressionStrategy": { "algorithm": "hybrid", "config": { "compressionRatio": 0.7 } }
                }),
            },
        });
    }

    if metrics.quality.overall < config.quality_floor {
        out.push(Suggestion {
            kind: SuggestionKind::AddExamples,
            message: format!(
                "estimated quality {:.2} is below {:.2}",
                metrics.quality.overall, config.quality_floor
            ),
            impact: Impact::Medium,
            action: SuggestionAction::Manual {
                instruction: "Add a worked example of the expected output and fill every placeholder."
                    .into(),
            },
        });
    }

    if metrics.time.compile_ms > config.slow_compile_ms {
        out.push(Suggestion {
            kind: SuggestionKind::EnableCaching,
            message: format!(
                "compilation took {}ms, above {}ms",
                metrics.time.compile_ms, config.slow_compile_ms
            ),
            impact: Impact::Low,
            action: SuggestionAction::Auto {
                change: serde_json::json!({ "injectionStrategy": { "timing": "cached" } }),
            },
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_coverage() -> Coverage {
        Coverage {
            referenced_slots: 2,
            resolved_slots: 2,
            placeholders: 2,
            unresolved_placeholders: 0,
        }
    }

    #[test]
    fn cost_and_latency_follow_the_config() {
        let config = EngineConfig::default()
            .with_unit_cost(0.01)
            .with_latency_model(100.0, 2.0);
        let m = measure(&"x".repeat(4000), 1000, 5, &full_coverage(), &config);
        assert_eq!(m.token_usage.prompt_tokens, 1000);
        assert_eq!(m.token_usage.tokens_saved, 0);
        assert!((m.cost.estimated_cost - 0.01).abs() < 1e-12);
        assert_eq!(m.time.estimated_response_ms, 2100.0);
    }

    #[test]
    fn unfilled_placeholders_lower_completeness() {
        let coverage = Coverage {
            unresolved_placeholders: 1,
            ..full_coverage()
        };
        let q = quality("Summarize the report for the team.", &coverage);
        assert_eq!(q.completeness, 0.5);
        assert!(q.overall < quality("Summarize the report for the team.", &full_coverage()).overall);
    }

    #[test]
    fn empty_output_scores_zero() {
        assert_eq!(quality("  ", &full_coverage()).overall, 0.0);
    }

    #[test]
    fn large_prompts_suggest_compression() {
        let config = EngineConfig::default().with_token_high_water(10);
        let m = measure(&"word ".repeat(40), 50, 1, &full_coverage(), &config);
        let s = suggestions(&m, false, &config);
        assert!(s.iter().any(|s| s.kind == SuggestionKind::EnableCompression
            && matches!(s.action, SuggestionAction::Auto { .. })));
        assert!(suggestions(&m, true, &config)
            .iter()
            .all(|s| s.kind != SuggestionKind::EnableCompression));
    }

    #[test]
    fn slow_compiles_suggest_caching() {
        let config = EngineConfig::default();
        let m = measure("Short prompt here.", 5, config.slow_compile_ms + 1, &full_coverage(), &config);
        let s = suggestions(&m, false, &config);
        assert!(s.iter().any(|s| s.kind == SuggestionKind::EnableCaching));
    }

    #[test]
    fn low_quality_suggests_examples_manually() {
        let config = EngineConfig::default().with_quality_floor(0.99);
        let m = measure("Short prompt here.", 5, 0, &full_coverage(), &config);
        let s = suggestions(&m, false, &config);
        assert!(s.iter().any(|s| s.kind == SuggestionKind::AddExamples
            && matches!(s.action, SuggestionAction::Manual { .. })));
    }
}
