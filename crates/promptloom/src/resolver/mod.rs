//! Slot value resolution.
//!
//! [`SlotResolver::resolve_slots`] turns slot definitions plus caller
//! values into a [`ResolvedSlots`] report:
//!
//! 1. order slots topologically (cycles and unknown dependencies abort);
//!    a conditional slot also waits for any slot its rules test,
//! 2. resolve independent slots concurrently (parallel mode) or everything
//!    in order (sequential mode),
//! 3. resolve dependent slots strictly in topological order, each seeing
//!    the values resolved so far,
//! 4. recover per-slot failures through the slot's error handling.
//!
//! API calls are capped by a semaphore, bounded by a per-call timeout,
//! retried with backoff, and coalesced when an identical request for the
//! same slot is already in flight.

pub mod conditional;
pub mod expr;
pub mod fetch;
pub mod graph;
pub mod retry;
pub mod system;
pub mod transform;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, RetryBackoff};
use crate::error::{EngineError, SlotError, Violations};
use crate::model::{
    ApiSource, CachingPolicy, DataSource, ErrorStrategy, InjectionStrategy, InjectionTiming,
    SlotDefinition, SlotKind,
};
use crate::value::{SlotValue, SlotValues};

use fetch::{ApiFetcher, ApiRequest, FetchResult, HttpFetcher, extract_path};
use retry::{RetryPolicy, classify};

// ── Options & report ───────────────────────────────────────────────

/// Per-request resolution options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveOptions {
    /// Hard deadline for each API call.
    pub timeout: Duration,
    /// Retries after a failed API call.
    pub retry_count: u32,
    pub cache_enabled: bool,
    /// Fan independent slots out concurrently.
    pub parallel: bool,
    /// Abort on missing required values instead of reporting them.
    pub strict: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5_000),
            retry_count: 2,
            cache_enabled: true,
            parallel: true,
            strict: false,
        }
    }
}

impl ResolveOptions {
    /// Timeout and retry count from the strategy's performance budget.
    pub fn from_strategy(strategy: &InjectionStrategy) -> Self {
        Self {
            timeout: Duration::from_millis(strategy.performance.timeout_ms),
            retry_count: strategy.performance.retry_count,
            ..Self::default()
        }
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }
}

/// A slot whose value came from error handling rather than its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotFallback {
    pub slot: String,
    pub strategy: ErrorStrategy,
    pub reason: String,
}

/// Outcome of one resolution request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSlots {
    pub values: SlotValues,
    /// Ids of resolved slots in the order they were resolved.
    pub order: Vec<String>,
    /// Slots left out of `values` (skip strategy, or no value available).
    pub skipped: Vec<String>,
    pub fallbacks: Vec<SlotFallback>,
    /// Required slots without a value, when not strict.
    pub missing: Vec<String>,
}

impl ResolvedSlots {
    pub fn get(&self, id: &str) -> Option<&SlotValue> {
        self.values.get(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What happened to a single slot.
enum Outcome {
    Resolved(SlotValue),
    Recovered(SlotValue, SlotFallback),
    Skipped(String),
    Missing(SlotError),
}

// ── Resolver ───────────────────────────────────────────────────────

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

pub struct SlotResolver {
    fetcher: Arc<dyn ApiFetcher>,
    cache: Arc<TtlCache<SlotValue>>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
    permits: Arc<Semaphore>,
    backoff: RetryBackoff,
}

impl SlotResolver {
    /// A resolver using the real clock and the HTTP fetcher.
    pub fn new(config: &EngineConfig) -> Result<Self, String> {
        Ok(Self::with_fetcher(config, Arc::new(HttpFetcher::new()?)))
    }

    pub fn with_fetcher(config: &EngineConfig, fetcher: Arc<dyn ApiFetcher>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            fetcher,
            cache: Arc::new(TtlCache::with_clock(config.slot_cache_capacity, clock.clone())),
            clock,
            in_flight: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            backoff: config.retry_backoff,
        }
    }

    /// Replace the clock. The slot cache is rebuilt on the new clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>, cache_capacity: usize) -> Self {
        self.cache = Arc::new(TtlCache::with_clock(cache_capacity, clock.clone()));
        self.clock = clock;
        self
    }

    /// Share an existing slot cache.
    pub fn with_cache(mut self, cache: Arc<TtlCache<SlotValue>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &TtlCache<SlotValue> {
        &self.cache
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub async fn resolve_slots(
        &self,
        slots: &[SlotDefinition],
        values: &SlotValues,
        strategy: &InjectionStrategy,
        options: &ResolveOptions,
    ) -> Result<ResolvedSlots, EngineError> {
        let order = graph::topological_order(slots)?;
        let force_cache = strategy.timing == InjectionTiming::Cached;
        debug!(
            "[resolve] {} slot(s), parallel={}, timing={:?}",
            slots.len(),
            options.parallel,
            strategy.timing
        );

        let mut report = ResolvedSlots::default();
        let mut violations = Vec::new();
        let mut context = values.clone();

        let known: HashSet<&str> = slots.iter().map(|s| s.id.as_str()).collect();
        let (independent, dependent): (Vec<usize>, Vec<usize>) = if options.parallel {
            order
                .iter()
                .copied()
                .partition(|&i| !graph::prerequisites(&slots[i]).any(|id| known.contains(id)))
        } else {
            (Vec::new(), order.clone())
        };

        if !independent.is_empty() {
            let outcomes = join_all(
                independent
                    .iter()
                    .map(|&i| self.resolve_one(&slots[i], values, options, force_cache)),
            )
            .await;
            for (&i, outcome) in independent.iter().zip(outcomes) {
                record(&slots[i], outcome, &mut report, &mut context, &mut violations);
            }
        }

        for &i in &dependent {
            let outcome = self
                .resolve_one(&slots[i], &context, options, force_cache)
                .await;
            record(&slots[i], outcome, &mut report, &mut context, &mut violations);
        }

        if options.strict && !violations.is_empty() {
            return Err(Violations(violations).into());
        }
        Ok(report)
    }

    async fn resolve_one(
        &self,
        slot: &SlotDefinition,
        context: &SlotValues,
        options: &ResolveOptions,
        force_cache: bool,
    ) -> Outcome {
        let caching = self.caching_for(slot, options, force_cache);
        let cache_key = caching
            .as_ref()
            .map(|c| c.key.clone().filter(|k| !k.is_empty()).unwrap_or_else(|| slot.id.clone()));

        if let Some(key) = &cache_key {
            if let Some(value) = self.cache.get(key) {
                debug!("[resolve] cache hit for '{}' ({key})", slot.id);
                return Outcome::Resolved(value);
            }
            debug!("[resolve] cache miss for '{}' ({key})", slot.id);
        }

        let produced = self.produce(slot, context, options).await;
        let result = match produced {
            // An absent optional user value renders empty as-is.
            Ok(Produced::Implicit(value)) => Ok(value),
            Ok(Produced::Value(value)) => finish(slot, value),
            Err(err) => Err(err),
        };

        match result {
            Ok(value) => {
                if let (Some(key), Some(policy)) = (cache_key, caching) {
                    self.cache
                        .insert(key, value.clone(), Duration::from_secs(policy.ttl_seconds));
                }
                Outcome::Resolved(value)
            }
            Err(err) => recover(slot, err),
        }
    }

    /// Effective caching policy. User slots are never cached.
    fn caching_for(
        &self,
        slot: &SlotDefinition,
        options: &ResolveOptions,
        force: bool,
    ) -> Option<CachingPolicy> {
        if slot.kind == SlotKind::User {
            return None;
        }
        match &slot.caching {
            Some(policy) if force || (options.cache_enabled && policy.enabled) => {
                Some(policy.clone())
            }
            None if force => Some(CachingPolicy::default()),
            _ => None,
        }
    }

    async fn produce(
        &self,
        slot: &SlotDefinition,
        context: &SlotValues,
        options: &ResolveOptions,
    ) -> Result<Produced, SlotError> {
        let source = slot.data_source.as_ref();

        if slot.kind == SlotKind::User {
            return match context.get(&slot.id).filter(|v| !v.is_empty()) {
                Some(value) => Ok(Produced::Value(value.clone())),
                None => match &slot.default_value {
                    Some(default) => Ok(Produced::Value(default.clone())),
                    None if slot.required => Err(SlotError::MissingRequiredValue {
                        slot: slot.id.clone(),
                    }),
                    None => Ok(Produced::Implicit(SlotValue::Text(String::new()))),
                },
            };
        }

        if slot.kind == SlotKind::System
            && let Some(value) = system::system_value(&slot.id, self.clock.as_ref())
        {
            return Ok(Produced::Value(value));
        }

        let value = match (slot.kind, source) {
            (_, Some(DataSource::Static { value })) => value.clone(),
            (_, Some(DataSource::External { fallback_value })) => {
                fallback_value
                    .clone()
                    .ok_or_else(|| SlotError::UnsupportedDataSourceType {
                        slot: slot.id.clone(),
                        detail: "external source has no fallbackValue".into(),
                    })?
            }
            (SlotKind::Api, Some(DataSource::Api(api))) => {
                self.fetch_api(slot, api, context, options).await?
            }
            (SlotKind::Computed, Some(DataSource::Computed {
                expression,
                formula,
            })) => {
                let Some(src) = expression.as_deref().or(formula.as_deref()) else {
                    return Err(SlotError::UnsupportedDataSourceType {
                        slot: slot.id.clone(),
                        detail: "computed source has no expression".into(),
                    });
                };
                expr::evaluate(src, |name| context.get(name).cloned()).map_err(|e| {
                    SlotError::DataSourceFailure {
                        slot: slot.id.clone(),
                        reason: format!("expression '{src}': {e}"),
                    }
                })?
            }
            (SlotKind::Conditional, _) => conditional::first_match(&slot.conditions, context)
                .or_else(|| slot.default_value.clone())
                .ok_or_else(|| SlotError::DataSourceFailure {
                    slot: slot.id.clone(),
                    reason: "no condition matched and no default".into(),
                })?,
            (kind, Some(other)) => {
                return Err(SlotError::UnsupportedDataSourceType {
                    slot: slot.id.clone(),
                    detail: format!("{kind} slot cannot use a '{}' source", other.type_name()),
                });
            }
            (SlotKind::System, None) => {
                slot.default_value
                    .clone()
                    .ok_or_else(|| SlotError::DataSourceFailure {
                        slot: slot.id.clone(),
                        reason: format!("no system value named '{}'", slot.id),
                    })?
            }
            (kind, None) => {
                slot.default_value
                    .clone()
                    .ok_or_else(|| SlotError::UnsupportedDataSourceType {
                        slot: slot.id.clone(),
                        detail: format!("{kind} slot has no data source"),
                    })?
            }
        };
        Ok(Produced::Value(value))
    }

    async fn fetch_api(
        &self,
        slot: &SlotDefinition,
        api: &ApiSource,
        context: &SlotValues,
        options: &ResolveOptions,
    ) -> Result<SlotValue, SlotError> {
        let request = ApiRequest::from_source(api, context);
        let retries = slot.error_handling.retry_count.unwrap_or(options.retry_count);
        let policy = RetryPolicy::from_backoff(&self.backoff, retries);

        let mut attempt = 0;
        let body = loop {
            match self.fetch_coalesced(&slot.id, &request, options.timeout).await {
                Ok(body) => break body,
                Err(reason) => {
                    let class = classify(&reason);
                    if attempt >= policy.max_retries || !class.is_retryable() {
                        return Err(SlotError::DataSourceFailure {
                            slot: slot.id.clone(),
                            reason,
                        });
                    }
                    let delay = policy.delay_for_attempt(attempt);
                    debug!(
                        "[resolve] '{}' attempt {} failed ({class:?}): {reason}; retrying in {}ms",
                        slot.id,
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        let extraction = api.response_extraction.as_ref();
        let extracted = match extraction.and_then(|e| e.path.as_deref()) {
            Some(path) => extract_path(&body, path).cloned().ok_or_else(|| {
                SlotError::DataSourceFailure {
                    slot: slot.id.clone(),
                    reason: format!("path '{path}' not found in response"),
                }
            })?,
            None => body,
        };
        let value = SlotValue::from_json(extracted).ok_or_else(|| SlotError::DataSourceFailure {
            slot: slot.id.clone(),
            reason: "response value is null".into(),
        })?;

        match extraction.and_then(|e| e.transform.as_ref()) {
            Some(t) => transform::apply(t, value).map_err(|reason| {
                SlotError::TransformationFailed {
                    slot: slot.id.clone(),
                    reason,
                }
            }),
            None => Ok(value),
        }
    }

    /// One attempt. Callers asking for the same `(slot, request)` while a
    /// call is outstanding share its result instead of issuing another.
    async fn fetch_coalesced(
        &self,
        slot_id: &str,
        request: &ApiRequest,
        timeout: Duration,
    ) -> FetchResult {
        let key = format!(
            "{slot_id}|{}",
            serde_json::to_string(request).unwrap_or_default()
        );

        let shared = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = in_flight.get(&key) {
                debug!("[resolve] joining in-flight request for '{slot_id}'");
                existing.clone()
            } else {
                let fetcher = self.fetcher.clone();
                let permits = self.permits.clone();
                let request = request.clone();
                let call = async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| format!("request limiter closed: {e}"))?;
                    match tokio::time::timeout(timeout, fetcher.fetch(&request)).await {
                        Ok(result) => result,
                        Err(_) => Err(format!(
                            "request timed out after {}ms",
                            timeout.as_millis()
                        )),
                    }
                }
                .boxed()
                .shared();
                in_flight.insert(key.clone(), call.clone());
                call
            }
        };

        let result = shared.clone().await;
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.get(&key).is_some_and(|f| f.ptr_eq(&shared)) {
            in_flight.remove(&key);
        }
        result
    }
}

impl std::fmt::Debug for SlotResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotResolver")
            .field("cache", &self.cache)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

enum Produced {
    /// From the slot's source; transformation and validation still apply.
    Value(SlotValue),
    /// Placeholder value for an absent optional user slot.
    Implicit(SlotValue),
}

/// Apply the slot's transformation, then its validation rules.
fn finish(slot: &SlotDefinition, value: SlotValue) -> Result<SlotValue, SlotError> {
    let value = match &slot.transformation {
        Some(t) => transform::apply(t, value).map_err(|reason| SlotError::TransformationFailed {
            slot: slot.id.clone(),
            reason,
        })?,
        None => value,
    };
    for rule in &slot.validation_rules {
        transform::validate(rule, &value).map_err(|reason| SlotError::ValidationFailed {
            slot: slot.id.clone(),
            reason,
        })?;
    }
    Ok(value)
}

/// Route a failure through the slot's error handling.
fn recover(slot: &SlotDefinition, err: SlotError) -> Outcome {
    let handling = &slot.error_handling;
    let fallback = handling.fallback_value.clone();
    let default = slot.default_value.clone();

    let substitute = match handling.strategy {
        ErrorStrategy::Skip => return Outcome::Skipped(err.to_string()),
        ErrorStrategy::Fallback => fallback.or(default),
        ErrorStrategy::Retry => default.or(fallback),
        ErrorStrategy::Alert => {
            warn!("[resolve] slot '{}' failed: {err}", slot.id);
            default.or(fallback)
        }
    };

    match substitute {
        Some(value) => {
            info!(
                "[resolve] slot '{}' fell back ({:?}): {err}",
                slot.id, handling.strategy
            );
            Outcome::Recovered(
                value,
                SlotFallback {
                    slot: slot.id.clone(),
                    strategy: handling.strategy,
                    reason: err.to_string(),
                },
            )
        }
        None if slot.required => Outcome::Missing(SlotError::MissingRequiredValue {
            slot: slot.id.clone(),
        }),
        None => Outcome::Skipped(err.to_string()),
    }
}

fn record(
    slot: &SlotDefinition,
    outcome: Outcome,
    report: &mut ResolvedSlots,
    context: &mut SlotValues,
    violations: &mut Vec<SlotError>,
) {
    let value = match outcome {
        Outcome::Resolved(value) => value,
        Outcome::Recovered(value, fallback) => {
            report.fallbacks.push(fallback);
            value
        }
        Outcome::Skipped(reason) => {
            debug!("[resolve] skipping '{}': {reason}", slot.id);
            report.skipped.push(slot.id.clone());
            return;
        }
        Outcome::Missing(err) => {
            warn!("[resolve] {err}");
            report.missing.push(slot.id.clone());
            violations.push(err);
            return;
        }
    };
    context.insert(slot.id.clone(), value.clone());
    report.values.insert(slot.id.clone(), value);
    report.order.push(slot.id.clone());
}
