//! Text compression engine.
//!
//! [`Compressor::compress`] runs one pipeline per call:
//!
//! 1. Preprocess (quotes, punctuation runs, whitespace).
//! 2. Analyze the text and extract the key information to keep.
//! 3. Apply the caller's rules, then the algorithm's heuristic steps in
//!    order, stopping once the target ratio is reached.
//! 4. Score the result and, when adaptive compression is enabled and the
//!    score is below the threshold, re-run once with a relaxed target.
//! 5. Record a history sample for the strategy.
//!
//! The measured `compression_ratio` is always the character-length ratio
//! of the returned text to the caller's input.

pub mod analysis;
pub mod history;
pub mod preprocess;
pub mod quality;
pub mod semantic;
pub mod syntactic;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::model::{CompressionAlgorithm, CompressionStrategy};
use analysis::{CHARS_PER_TOKEN, KeyInformation, analyze, estimate_tokens, extract_key_information};
use history::{History, Sample, Trend};
use quality::{QualityBreakdown, QualityInput};
use syntactic::CompiledRule;

/// A named heuristic step. Steps are pure functions of their input text.
pub(crate) type Step = (&'static str, fn(&str, &StepContext) -> String);

/// Id reported when semantic keyword re-insertion changed the text.
const REINSERTION_ID: &str = "semantic:keyword-reinsertion";

/// Shared read-only state handed to every step.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    /// Lowercased keywords no step may delete.
    pub preserved: HashSet<String>,
    pub key_info: KeyInformation,
    /// Preprocessed input, the source for keyword re-insertion.
    pub original: String,
}

impl StepContext {
    pub fn is_preserved(&self, word: &str) -> bool {
        self.preserved.contains(&word.trim().to_lowercase())
    }
}

// ── Options & results ──────────────────────────────────────────────

/// Per-call overrides of the strategy's `config`.
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub preserve_structure: Option<bool>,
    /// Added to the strategy's own preserved keywords.
    pub preserve_keywords: Vec<String>,
    pub target_ratio: Option<f64>,
    pub quality_threshold: Option<f64>,
}

impl CompressOptions {
    pub fn with_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = Some(preserve);
        self
    }

    pub fn preserving<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preserve_keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_target_ratio(mut self, ratio: f64) -> Self {
        self.target_ratio = Some(ratio);
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = Some(threshold);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionMetrics {
    pub processing_time_ms: u64,
    pub confidence: f64,
    pub algorithm: CompressionAlgorithm,
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub complexity: f64,
    /// Target the returned text was produced for.
    pub target_ratio: f64,
    pub first_pass_ratio: f64,
    pub adaptive_retry: bool,
    pub trend: Trend,
    pub quality: QualityBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionResult {
    pub original_text: String,
    pub compressed_text: String,
    pub compression_ratio: f64,
    pub quality_score: f64,
    pub tokens_saved: usize,
    /// Caller-preserved keywords present in the compressed text.
    pub preserved_keywords: Vec<String>,
    /// Caller rules and heuristic steps that changed the text, in order.
    pub applied_rule_ids: Vec<String>,
    pub metrics: CompressionMetrics,
}

fn char_ratio(text: &str, original_chars: usize) -> f64 {
    if original_chars == 0 {
        return 1.0;
    }
    text.chars().count() as f64 / original_chars as f64
}

struct Pass {
    text: String,
    applied: Vec<String>,
}

/// Resolved per-call settings.
struct Settings {
    target: f64,
    threshold: f64,
    preserve_structure: bool,
    preserve: Vec<String>,
}

impl Settings {
    fn new(strategy: &CompressionStrategy, options: &CompressOptions) -> Self {
        let mut preserve = strategy.config.preserve_keywords.clone();
        for kw in &options.preserve_keywords {
            if !preserve.iter().any(|p| p.eq_ignore_ascii_case(kw)) {
                preserve.push(kw.clone());
            }
        }
        Self {
            target: options
                .target_ratio
                .unwrap_or(strategy.config.compression_ratio)
                .clamp(0.0, 1.0),
            threshold: options
                .quality_threshold
                .unwrap_or(strategy.config.quality_threshold),
            preserve_structure: options
                .preserve_structure
                .unwrap_or(strategy.config.preserve_structure),
            preserve,
        }
    }

    fn present_keywords(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.preserve
            .iter()
            .filter(|k| lower.contains(&k.to_lowercase()))
            .cloned()
            .collect()
    }
}

// ── Compressor ─────────────────────────────────────────────────────

/// Stateless apart from the per-strategy learning history.
#[derive(Debug, Default)]
pub struct Compressor {
    histories: Mutex<HashMap<String, History>>,
}

impl Compressor {
    pub fn new() -> Self {
        Self::default()
    }

    fn histories(&self) -> std::sync::MutexGuard<'_, HashMap<String, History>> {
        self.histories.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Samples recorded for one strategy, oldest first.
    pub fn history(&self, strategy_id: &str) -> Vec<Sample> {
        self.histories()
            .get(strategy_id)
            .map(History::samples)
            .unwrap_or_default()
    }

    pub fn export_history(&self) -> BTreeMap<String, Vec<Sample>> {
        self.histories()
            .iter()
            .map(|(id, h)| (id.clone(), h.samples()))
            .collect()
    }

    /// Replace the history of every strategy named in `histories`.
    pub fn import_history(&self, histories: BTreeMap<String, Vec<Sample>>) {
        let mut guard = self.histories();
        for (id, samples) in histories {
            guard.insert(id, History::from_samples(samples));
        }
    }

    pub fn compress(
        &self,
        text: &str,
        strategy: &CompressionStrategy,
        options: &CompressOptions,
    ) -> Result<CompressionResult, EngineError> {
        let started = Instant::now();
        let rules = syntactic::compile_rules(&strategy.rules)?;
        let mut settings = Settings::new(strategy, options);

        let original_chars = text.chars().count();
        let original_tokens = estimate_tokens(text);

        if text.trim().is_empty() {
            debug!("[compress] empty input, nothing to do");
            return Ok(self.unchanged(text, strategy, &settings, started));
        }
        if let Some(max_tokens) = strategy.config.max_tokens {
            let max_tokens = max_tokens as usize;
            if original_tokens <= max_tokens {
                debug!(
                    "[compress] {original_tokens} tokens within budget of {max_tokens}, returning input"
                );
                return Ok(self.unchanged(text, strategy, &settings, started));
            }
            let budget_ratio = (max_tokens * CHARS_PER_TOKEN) as f64 / original_chars as f64;
            settings.target = settings.target.min(budget_ratio);
        }

        let prepared = preprocess::preprocess(text, settings.preserve_structure);
        let analysis = analyze(&prepared);
        let key_info = extract_key_information(&prepared, &analysis, &settings.preserve);
        let ctx = StepContext {
            preserved: settings.preserve.iter().map(|k| k.to_lowercase()).collect(),
            key_info,
            original: prepared.clone(),
        };

        let first = run_pipeline(
            &prepared,
            original_chars,
            strategy.algorithm,
            &rules,
            &ctx,
            settings.target,
        );
        let first_ratio = char_ratio(&first.text, original_chars);
        let first_quality = assess(text, &first.text, &ctx, first_ratio, settings.target, &settings);

        let mut chosen = (first, first_ratio, first_quality, settings.target);
        let mut adaptive_retry = false;

        if strategy.adaptive.enabled && chosen.2.overall < settings.threshold {
            let step = strategy.adaptive.learning_rate.clamp(0.05, 1.0);
            let relaxed = settings.target + (1.0 - settings.target) * step;
            debug!(
                "[compress] quality {:.2} below {:.2}, retrying at ratio {relaxed:.2}",
                chosen.2.overall, settings.threshold
            );
            let retry = run_pipeline(
                &prepared,
                original_chars,
                CompressionAlgorithm::Hybrid,
                &rules,
                &ctx,
                relaxed,
            );
            let retry_ratio = char_ratio(&retry.text, original_chars);
            if retry_ratio >= first_ratio {
                let retry_quality = assess(text, &retry.text, &ctx, retry_ratio, relaxed, &settings);
                chosen = (retry, retry_ratio, retry_quality, relaxed);
                adaptive_retry = true;
            } else {
                debug!("[compress] retry compressed harder ({retry_ratio:.2}), keeping first pass");
            }
        }

        let (pass, ratio, breakdown, target) = chosen;
        let compressed_tokens = estimate_tokens(&pass.text);
        let sample = Sample {
            original_length: original_chars,
            compressed_length: pass.text.chars().count(),
            quality: breakdown.overall,
        };
        let trend = {
            let mut histories = self.histories();
            let history = histories.entry(strategy.id.clone()).or_default();
            history.record(sample);
            history.trend(strategy.adaptive.min_samples)
        };

        info!(
            "[compress] {original_chars} -> {} chars (ratio {ratio:.2}, quality {:.2}, {})",
            pass.text.chars().count(),
            breakdown.overall,
            strategy.algorithm
        );

        Ok(CompressionResult {
            original_text: text.to_string(),
            preserved_keywords: settings.present_keywords(&pass.text),
            compression_ratio: ratio,
            quality_score: breakdown.overall,
            tokens_saved: original_tokens.saturating_sub(compressed_tokens),
            applied_rule_ids: pass.applied,
            metrics: CompressionMetrics {
                processing_time_ms: started.elapsed().as_millis() as u64,
                confidence: breakdown.overall * (1.0 - 0.2 * analysis.complexity),
                algorithm: strategy.algorithm,
                original_tokens,
                compressed_tokens,
                complexity: analysis.complexity,
                target_ratio: target,
                first_pass_ratio: first_ratio,
                adaptive_retry,
                trend,
                quality: breakdown,
            },
            compressed_text: pass.text,
        })
    }

    fn unchanged(
        &self,
        text: &str,
        strategy: &CompressionStrategy,
        settings: &Settings,
        started: Instant,
    ) -> CompressionResult {
        let tokens = estimate_tokens(text);
        let trend = self
            .histories()
            .get(&strategy.id)
            .map_or(Trend::Stable, |h| h.trend(strategy.adaptive.min_samples));
        CompressionResult {
            original_text: text.to_string(),
            compressed_text: text.to_string(),
            compression_ratio: 1.0,
            quality_score: 1.0,
            tokens_saved: 0,
            preserved_keywords: settings.present_keywords(text),
            applied_rule_ids: Vec::new(),
            metrics: CompressionMetrics {
                processing_time_ms: started.elapsed().as_millis() as u64,
                confidence: 1.0,
                algorithm: strategy.algorithm,
                original_tokens: tokens,
                compressed_tokens: tokens,
                complexity: analysis::complexity(text),
                target_ratio: settings.target,
                first_pass_ratio: 1.0,
                adaptive_retry: false,
                trend,
                quality: QualityBreakdown {
                    keyword_retention: 1.0,
                    semantic_integrity: 1.0,
                    ratio_fit: 1.0,
                    readability: 1.0,
                    structure: None,
                    overall: 1.0,
                },
            },
        }
    }
}

fn steps_for(algorithm: CompressionAlgorithm) -> Vec<&'static Step> {
    match algorithm {
        CompressionAlgorithm::Syntactic => syntactic::STEPS.iter().collect(),
        CompressionAlgorithm::Semantic => semantic::STEPS.iter().collect(),
        CompressionAlgorithm::Hybrid => syntactic::STEPS.iter().chain(semantic::STEPS).collect(),
    }
}

fn run_pipeline(
    prepared: &str,
    original_chars: usize,
    algorithm: CompressionAlgorithm,
    rules: &[CompiledRule],
    ctx: &StepContext,
    target: f64,
) -> Pass {
    let mut applied = Vec::new();
    let mut text = syntactic::tidy(&syntactic::apply_rules(prepared, rules, &mut applied));

    for (id, step) in steps_for(algorithm) {
        if char_ratio(&text, original_chars) <= target {
            debug!("[compress] target {target:.2} reached before {id}");
            break;
        }
        let next = syntactic::tidy(&step(&text, ctx));
        if next != text {
            applied.push((*id).to_string());
            text = next;
        }
    }

    if algorithm != CompressionAlgorithm::Syntactic
        && semantic::reinsert_keywords(&mut text, ctx, original_chars)
    {
        applied.push(REINSERTION_ID.to_string());
    }
    Pass { text, applied }
}

fn assess(
    original: &str,
    compressed: &str,
    ctx: &StepContext,
    ratio: f64,
    target: f64,
    settings: &Settings,
) -> QualityBreakdown {
    quality::score(&QualityInput {
        original,
        compressed,
        keywords: &ctx.key_info.keywords,
        ratio,
        target_ratio: target,
        preserve_structure: settings.preserve_structure,
    })
}
