//! Prompt compiler: the engine's entry point.
//!
//! [`PromptCompiler::compile`] validates a template's slots, resolves them,
//! substitutes placeholders, optionally compresses the result and attaches
//! metrics, suggestions and issues. Results are cached for
//! `EngineConfig::preview_ttl_secs`, keyed by the template, both strategies,
//! the options and the slot values. Validation runs before the cache
//! lookup.
//!
//! ```ignore
//! let compiler = PromptCompiler::new(EngineConfig::default())?;
//! let template = Template::new("greet", "Hi {{name}} from {{company}}")
//!     .with_slot(SlotDefinition::user("name").with_default("Guest"))
//!     .with_slot(SlotDefinition::user("company").required());
//! let values = SlotValues::from([("company".into(), SlotValue::text("Acme"))]);
//! let preview = compiler
//!     .compile(&template, &values, &InjectionStrategy::default(), None, &CompileOptions::default())
//!     .await?;
//! assert_eq!(preview.compiled_prompt, "Hi Guest from Acme");
//! ```

pub mod diagnostics;
pub mod metrics;
pub mod substitute;

use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::compress::{CompressOptions, CompressionResult, Compressor};
use crate::config::EngineConfig;
use crate::error::{EngineError, Violations};
use crate::model::{
    CompressionAlgorithm, CompressionStrategy, InjectionStrategy, InjectionTiming, SlotDefinition,
    Template,
};
use crate::resolver::{ResolveOptions, SlotFallback, SlotResolver, graph};
use crate::value::SlotValues;

use diagnostics::{Issue, IssueKind};
use metrics::{Coverage, PreviewMetrics, Suggestion};

// ── Options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CompileOptions {
    /// Abort on missing required values instead of reporting them.
    #[serde(rename = "strictMode")]
    pub strict: bool,
    #[serde(rename = "validateSlots")]
    pub validate: bool,
    /// Trim trailing whitespace and collapse blank lines before compression.
    #[serde(rename = "optimizeOutput")]
    pub optimize: bool,
    #[serde(rename = "includeDebugInfo")]
    pub debug: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict: false,
            validate: true,
            optimize: false,
            debug: false,
        }
    }
}

impl CompileOptions {
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn optimized(mut self) -> Self {
        self.optimize = true;
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

/// Everything needed to compile a template except the caller's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompileConfig {
    pub template: Template,
    #[serde(default)]
    pub injection_strategy: InjectionStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_strategy: Option<CompressionStrategy>,
    #[serde(default)]
    pub options: CompileOptions,
}

impl CompileConfig {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            injection_strategy: InjectionStrategy::default(),
            compression_strategy: None,
            options: CompileOptions::default(),
        }
    }
}

// ── Results ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSummary {
    pub algorithm: CompressionAlgorithm,
    pub compression_ratio: f64,
    pub quality_score: f64,
    pub tokens_saved: usize,
    pub applied_rule_ids: Vec<String>,
    pub adaptive_retry: bool,
}

impl From<&CompressionResult> for CompressionSummary {
    fn from(result: &CompressionResult) -> Self {
        Self {
            algorithm: result.metrics.algorithm,
            compression_ratio: result.compression_ratio,
            quality_score: result.quality_score,
            tokens_saved: result.tokens_saved,
            applied_rule_ids: result.applied_rule_ids.clone(),
            adaptive_retry: result.metrics.adaptive_retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub resolved_values: SlotValues,
    /// Slot ids in substitution order.
    pub injection_order: Vec<String>,
    /// Slot ids in the order the resolver produced them.
    pub resolution_order: Vec<String>,
    pub skipped: Vec<String>,
    pub fallbacks: Vec<SlotFallback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub compiled_prompt: String,
    pub token_count: usize,
    pub estimated_cost: f64,
    pub estimated_response_time_ms: f64,
    pub quality_score: f64,
    pub metrics: PreviewMetrics,
    pub suggestions: Vec<Suggestion>,
    pub issues: Vec<Issue>,
    /// Served from the compiled-output cache.
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl PreviewResult {
    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

// ── Compiler ───────────────────────────────────────────────────────

/// Everything besides the values that shapes a preview.
#[derive(Serialize)]
struct CompileIdentity<'a> {
    template: &'a Template,
    injection: &'a InjectionStrategy,
    compression: Option<&'a CompressionStrategy>,
    options: &'a CompileOptions,
}

impl<'a> CompileIdentity<'a> {
    fn of(config: &'a CompileConfig) -> Self {
        Self {
            template: &config.template,
            injection: &config.injection_strategy,
            compression: config.compression_strategy.as_ref(),
            options: &config.options,
        }
    }

    fn key(&self, values: &SlotValues) -> String {
        let identity = serde_json::to_vec(self).unwrap_or_default();
        let values = serde_json::to_vec(values).unwrap_or_default();
        format!(
            "{}#{:x}:{:x}",
            self.template.id,
            Sha256::digest(&identity),
            Sha256::digest(&values)
        )
    }
}

pub struct PromptCompiler {
    config: EngineConfig,
    resolver: SlotResolver,
    compressor: Compressor,
    previews: TtlCache<PreviewResult>,
}

impl PromptCompiler {
    /// A compiler that fetches API slots over HTTP.
    pub fn new(config: EngineConfig) -> Result<Self, String> {
        let resolver = SlotResolver::new(&config)?;
        Ok(Self::with_resolver(config, resolver))
    }

    /// The preview cache runs on the resolver's clock.
    pub fn with_resolver(config: EngineConfig, resolver: SlotResolver) -> Self {
        let previews = TtlCache::with_clock(config.preview_cache_capacity, resolver.clock());
        Self {
            config,
            resolver,
            compressor: Compressor::new(),
            previews,
        }
    }

    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &SlotResolver {
        &self.resolver
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// `<template id>#<sha256 of template, strategies and options>:<sha256 of the values>`.
    pub fn cache_key(config: &CompileConfig, values: &SlotValues) -> String {
        CompileIdentity::of(config).key(values)
    }

    pub fn cached_preview(&self, config: &CompileConfig, values: &SlotValues) -> Option<PreviewResult> {
        self.lookup(&Self::cache_key(config, values))
    }

    pub fn cached_prompt(&self, config: &CompileConfig, values: &SlotValues) -> Option<String> {
        self.cached_preview(config, values)
            .map(|p| p.compiled_prompt)
    }

    fn lookup(&self, key: &str) -> Option<PreviewResult> {
        self.previews.get(key).map(|mut preview| {
            preview.from_cache = true;
            preview
        })
    }

    /// Drop expired previews. Returns how many were removed.
    pub fn sweep_cache(&self) -> usize {
        self.previews.sweep()
    }

    pub async fn compile_config(
        &self,
        config: &CompileConfig,
        values: &SlotValues,
    ) -> Result<PreviewResult, EngineError> {
        self.compile(
            &config.template,
            values,
            &config.injection_strategy,
            config.compression_strategy.as_ref(),
            &config.options,
        )
        .await
    }

    pub async fn compile(
        &self,
        template: &Template,
        values: &SlotValues,
        injection: &InjectionStrategy,
        compression: Option<&CompressionStrategy>,
        options: &CompileOptions,
    ) -> Result<PreviewResult, EngineError> {
        let started = Instant::now();
        let slots: Vec<SlotDefinition> = match injection.timing {
            InjectionTiming::Lazy => {
                graph::referenced_closure(&template.slots, &template.base_prompt)
                    .into_iter()
                    .cloned()
                    .collect()
            }
            InjectionTiming::Immediate | InjectionTiming::Cached => template.slots.clone(),
        };
        debug!(
            "[compile] '{}': {} of {} slot(s) in scope",
            template.id,
            slots.len(),
            template.slots.len()
        );

        let mut issues = Vec::new();
        if options.validate {
            let missing = diagnostics::missing_required(&slots, values);
            if options.strict {
                let mut violations = graph::topological_order(&slots)
                    .err()
                    .map(|v| v.0)
                    .unwrap_or_default();
                violations.extend(missing);
                if !violations.is_empty() {
                    warn!("[compile] '{}' rejected: {} violation(s)", template.id, violations.len());
                    return Err(Violations(violations).into());
                }
            } else {
                issues.extend(
                    missing
                        .iter()
                        .filter_map(|e| e.slot())
                        .map(Issue::missing_required),
                );
            }
        }

        let key = CompileIdentity {
            template,
            injection,
            compression,
            options,
        }
        .key(values);
        if let Some(preview) = self.lookup(&key) {
            debug!("[compile] cache hit for '{}'", template.id);
            return Ok(preview);
        }

        let resolve_options = ResolveOptions::from_strategy(injection).strict(options.strict);
        let resolved = self
            .resolver
            .resolve_slots(&slots, values, injection, &resolve_options)
            .await?;
        issues.extend(resolved.fallbacks.iter().map(Issue::fallback));
        for id in &resolved.missing {
            let reported = issues.iter().any(|i| {
                i.kind == IssueKind::MissingRequiredValue && i.slot.as_deref() == Some(id.as_str())
            });
            if !reported {
                issues.push(Issue::missing_required(id));
            }
        }

        let ordered = substitute::injection_order(&template.slots, injection);
        let mut text = substitute::substitute(&template.base_prompt, &ordered, &resolved.values);

        let unresolved = diagnostics::unresolved_placeholders(&text);
        issues.extend(unresolved.iter().map(|name| Issue::unresolved(name)));

        if options.optimize {
            text = substitute::optimize_output(&text);
        }
        let uncompressed_tokens = crate::compress::analysis::estimate_tokens(&text);

        let mut compression_summary = None;
        if let Some(strategy) = compression {
            match self.compressor.compress(&text, strategy, &CompressOptions::default()) {
                Ok(result) => {
                    compression_summary = Some(CompressionSummary::from(&result));
                    text = result.compressed_text;
                }
                Err(err) => {
                    warn!("[compile] compression failed for '{}': {err}", template.id);
                    issues.push(Issue::compression_failed(&err));
                }
            }
        }

        issues.extend(diagnostics::output_issues(&text, self.config.max_output_chars));

        let referenced: Vec<&SlotDefinition> = template.referenced_slots().collect();
        let coverage = Coverage {
            referenced_slots: referenced.len(),
            resolved_slots: referenced
                .iter()
                .filter(|s| resolved.values.contains_key(&s.id))
                .count(),
            placeholders: diagnostics::unresolved_placeholders(&template.base_prompt).len(),
            unresolved_placeholders: unresolved.len(),
        };
        let compile_ms = started.elapsed().as_millis() as u64;
        let metrics = metrics::measure(&text, uncompressed_tokens, compile_ms, &coverage, &self.config);
        let suggestions = metrics::suggestions(&metrics, compression.is_some(), &self.config);

        let debug = options.debug.then(|| DebugInfo {
            resolved_values: resolved.values.clone(),
            injection_order: ordered.iter().map(|s| s.id.clone()).collect(),
            resolution_order: resolved.order.clone(),
            skipped: resolved.skipped.clone(),
            fallbacks: resolved.fallbacks.clone(),
            compression: compression_summary.clone(),
        });

        info!(
            "[compile] '{}': {} ({} issue(s))",
            template.id,
            metrics.to_log_string(),
            issues.len()
        );

        let preview = PreviewResult {
            token_count: metrics.token_usage.prompt_tokens,
            estimated_cost: metrics.cost.estimated_cost,
            estimated_response_time_ms: metrics.time.estimated_response_ms,
            quality_score: metrics.quality.overall,
            compiled_prompt: text,
            metrics,
            suggestions,
            issues,
            from_cache: false,
            debug,
        };
        self.previews
            .insert(key, preview.clone(), self.config.preview_ttl());
        Ok(preview)
    }
}

impl std::fmt::Debug for PromptCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptCompiler")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("cached_previews", &self.previews.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{CompressionRule, ErrorHandling};
    use crate::resolver::fetch::{ApiFetcher, ApiRequest, FetchFuture};
    use crate::value::SlotValue;

    struct Offline;

    impl ApiFetcher for Offline {
        fn fetch<'a>(&'a self, _request: &'a ApiRequest) -> FetchFuture<'a> {
            Box::pin(async { Err("offline".to_string()) })
        }
    }

    fn compiler() -> PromptCompiler {
        let config = EngineConfig::default();
        let resolver = SlotResolver::with_fetcher(&config, Arc::new(Offline));
        PromptCompiler::with_resolver(config, resolver)
    }

    fn values(pairs: &[(&str, &str)]) -> SlotValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), SlotValue::text(*v)))
            .collect()
    }

    fn greeting() -> Template {
        Template::new("greet", "Hi {{name}} from {{company}}")
            .with_slot(SlotDefinition::user("name").required().with_default("Guest"))
            .with_slot(SlotDefinition::user("company").required())
    }

    #[tokio::test]
    async fn compiles_defaults_and_values() {
        let c = compiler();
        let preview = c
            .compile(
                &greeting(),
                &values(&[("company", "Acme")]),
                &InjectionStrategy::default(),
                None,
                &CompileOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(preview.compiled_prompt, "Hi Guest from Acme");
        assert!(preview.issues.is_empty());
        assert_eq!(preview.token_count, 5);
        assert!(!preview.from_cache);
    }

    #[tokio::test]
    async fn strict_mode_reports_every_missing_slot() {
        let c = compiler();
        let template = greeting().with_slot(SlotDefinition::user("role").required());
        let err = c
            .compile(
                &template,
                &SlotValues::new(),
                &InjectionStrategy::default(),
                None,
                &CompileOptions::default().strict(),
            )
            .await
            .unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations.missing_slots(), ["company", "role"]);
    }

    #[tokio::test]
    async fn lenient_mode_reports_issues() {
        let c = compiler();
        let preview = c
            .compile(
                &greeting(),
                &SlotValues::new(),
                &InjectionStrategy::default(),
                None,
                &CompileOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(preview.compiled_prompt, "Hi Guest from {{company}}");
        assert!(preview.has_issue(IssueKind::MissingRequiredValue));
        assert!(preview.has_issue(IssueKind::UnresolvedPlaceholder));
        let missing = preview
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::MissingRequiredValue)
            .count();
        assert_eq!(missing, 1);
    }

    #[tokio::test]
    async fn skipped_slots_leave_their_placeholder() {
        let c = compiler();
        let template = Template::new("t", "Weather: {{weather}}").with_slot(
            SlotDefinition::computed("weather", "missing_var")
                .with_error_handling(ErrorHandling::skip()),
        );
        let preview = c
            .compile(
                &template,
                &SlotValues::new(),
                &InjectionStrategy::default(),
                None,
                &CompileOptions::default().with_debug(),
            )
            .await
            .unwrap();
        assert_eq!(preview.compiled_prompt, "Weather: {{weather}}");
        assert!(preview.has_issue(IssueKind::UnresolvedPlaceholder));
        assert_eq!(preview.debug.unwrap().skipped, ["weather"]);
    }

    #[tokio::test]
    async fn second_compile_is_served_from_cache() {
        let c = compiler();
        let v = values(&[("company", "Acme")]);
        let strategy = InjectionStrategy::default();
        let first = c
            .compile(&greeting(), &v, &strategy, None, &CompileOptions::default())
            .await
            .unwrap();
        let second = c
            .compile(&greeting(), &v, &strategy, None, &CompileOptions::default())
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.compiled_prompt, first.compiled_prompt);
        let config = CompileConfig::new(greeting());
        assert_eq!(c.cached_prompt(&config, &v).as_deref(), Some("Hi Guest from Acme"));
        assert!(c.cached_prompt(&config, &values(&[("company", "Other")])).is_none());
    }

    #[tokio::test]
    async fn cached_previews_expire_by_ttl() {
        let clock = Arc::new(ManualClock::default());
        let config = EngineConfig::default().with_preview_ttl(Duration::from_secs(60));
        let resolver = SlotResolver::with_fetcher(&config, Arc::new(Offline))
            .with_clock(clock.clone(), config.slot_cache_capacity);
        let c = PromptCompiler::with_resolver(config, resolver);
        let v = values(&[("company", "Acme")]);
        c.compile(&greeting(), &v, &InjectionStrategy::default(), None, &CompileOptions::default())
            .await
            .unwrap();
        let config = CompileConfig::new(greeting());
        assert!(c.cached_preview(&config, &v).is_some());
        clock.advance(Duration::from_secs(61));
        assert!(c.cached_preview(&config, &v).is_none());
    }

    #[tokio::test]
    async fn lazy_timing_ignores_unreferenced_slots() {
        let c = compiler();
        let template = greeting().with_slot(SlotDefinition::user("unused").required());
        let v = values(&[("company", "Acme")]);
        let lazy = InjectionStrategy::default().with_timing(InjectionTiming::Lazy);
        let preview = c
            .compile(&template, &v, &lazy, None, &CompileOptions::default().strict().with_debug())
            .await
            .unwrap();
        assert_eq!(preview.compiled_prompt, "Hi Guest from Acme");
        assert!(!preview.debug.unwrap().resolved_values.contains_key("unused"));
    }

    #[tokio::test]
    async fn priority_decides_substitution_order() {
        let template = Template::new("nested", "{{a}}")
            .with_slot(SlotDefinition::user("a"))
            .with_slot(SlotDefinition::user("b"));
        let v = values(&[("a", "{{b}}"), ("b", "X")]);

        let declared = compiler()
            .compile(&template, &v, &InjectionStrategy::default(), None, &CompileOptions::default())
            .await
            .unwrap();
        assert_eq!(declared.compiled_prompt, "X");

        let b_first = InjectionStrategy::default().with_priority("b", 0);
        let reordered = compiler()
            .compile(&template, &v, &b_first, None, &CompileOptions::default())
            .await
            .unwrap();
        assert_eq!(reordered.compiled_prompt, "{{b}}");
    }

    #[tokio::test]
    async fn compression_is_applied_and_summarized() {
        let c = compiler();
        let template = Template::new("t", "Basically, you should really just restart {{thing}}.")
            .with_slot(SlotDefinition::user("thing").with_default("the server"));
        let strategy = CompressionStrategy::new("s", CompressionAlgorithm::Syntactic).with_ratio(0.5);
        let preview = c
            .compile(
                &template,
                &SlotValues::new(),
                &InjectionStrategy::default(),
                Some(&strategy),
                &CompileOptions::default().with_debug(),
            )
            .await
            .unwrap();
        assert_eq!(preview.compiled_prompt, "you should restart the server.");
        assert!(preview.metrics.token_usage.tokens_saved > 0);
        let summary = preview.debug.unwrap().compression.unwrap();
        assert_eq!(summary.applied_rule_ids, ["syntactic:filler-words"]);
    }

    #[tokio::test]
    async fn compression_failure_keeps_the_text() {
        let c = compiler();
        let template = Template::new("t", "Keep this text.");
        let strategy = CompressionStrategy::default().with_rule(CompressionRule::remove("bad", "("));
        let preview = c
            .compile(
                &template,
                &SlotValues::new(),
                &InjectionStrategy::default(),
                Some(&strategy),
                &CompileOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(preview.compiled_prompt, "Keep this text.");
        assert!(preview.has_issue(IssueKind::CompressionFailed));
    }

    #[tokio::test]
    async fn empty_and_optimized_output() {
        let c = compiler();
        let empty = Template::new("empty", "{{x}}").with_slot(SlotDefinition::user("x"));
        let preview = c
            .compile(&empty, &SlotValues::new(), &InjectionStrategy::default(), None, &CompileOptions::default())
            .await
            .unwrap();
        assert!(preview.has_issue(IssueKind::EmptyCompiledOutput));

        let messy = Template::new("messy", "A  \n\n\n\nB  ");
        let preview = c
            .compile(
                &messy,
                &SlotValues::new(),
                &InjectionStrategy::default(),
                None,
                &CompileOptions::default().optimized(),
            )
            .await
            .unwrap();
        assert_eq!(preview.compiled_prompt, "A\n\nB");
    }

    #[test]
    fn cache_key_covers_values_strategies_and_options() {
        let config = CompileConfig::new(Template::new("t", "{{x}}"));
        let one = values(&[("x", "1")]);
        let a = PromptCompiler::cache_key(&config, &one);
        assert!(a.starts_with("t#"));
        assert_eq!(a, PromptCompiler::cache_key(&config, &one));
        assert_ne!(a, PromptCompiler::cache_key(&config, &values(&[("x", "2")])));

        let mut compressed = config.clone();
        compressed.compression_strategy = Some(CompressionStrategy::default());
        let mut strict = config.clone();
        strict.options = CompileOptions::default().strict();
        let mut reordered = config.clone();
        reordered.injection_strategy = InjectionStrategy::default().with_priority("x", 1);
        let mut edited = config.clone();
        edited.template.base_prompt = "{{x}}!".into();
        for variant in [compressed, strict, reordered, edited] {
            assert_ne!(a, PromptCompiler::cache_key(&variant, &one));
        }
    }

    #[tokio::test]
    async fn strict_compile_is_not_served_a_lenient_preview() {
        let c = compiler();
        let empty = SlotValues::new();
        let lenient = c
            .compile(&greeting(), &empty, &InjectionStrategy::default(), None, &CompileOptions::default())
            .await
            .unwrap();
        assert!(lenient.has_issue(IssueKind::MissingRequiredValue));

        let err = c
            .compile(
                &greeting(),
                &empty,
                &InjectionStrategy::default(),
                None,
                &CompileOptions::default().strict(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.violations().unwrap().missing_slots(), ["company"]);
    }

    #[tokio::test]
    async fn adding_a_compression_strategy_bypasses_the_uncompressed_preview() {
        let c = compiler();
        let template = Template::new("note", "{{note}}").with_slot(SlotDefinition::user("note"));
        let v = values(&[("note", "Basically, you should really just restart the server.")]);
        let strategy = InjectionStrategy::default();
        let plain = c
            .compile(&template, &v, &strategy, None, &CompileOptions::default())
            .await
            .unwrap();
        let squeezed = CompressionStrategy::new("squeeze", CompressionAlgorithm::Syntactic).with_ratio(0.5);
        let compressed = c
            .compile(&template, &v, &strategy, Some(&squeezed), &CompileOptions::default())
            .await
            .unwrap();
        assert!(!compressed.from_cache);
        assert_eq!(compressed.compiled_prompt, "you should restart the server.");
        assert_ne!(compressed.compiled_prompt, plain.compiled_prompt);

        let again = c
            .compile(&template, &v, &strategy, Some(&squeezed), &CompileOptions::default())
            .await
            .unwrap();
        assert!(again.from_cache);
        assert_eq!(again.compiled_prompt, compressed.compiled_prompt);
    }
}
