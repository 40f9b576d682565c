//! Engine-wide tunables.
//!
//! Every constant the compiler, resolver and compressor consult lives in
//! [`EngineConfig`]. All fields have defaults, so a config file only needs
//! the values it overrides:
//!
//! ```ignore
//! let config = EngineConfig::default()
//!     .with_preview_ttl(Duration::from_secs(60))
//!     .with_unit_cost(0.003)
//!     .with_max_concurrent_requests(4);
//! ```

use std::path::Path;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Exponential backoff between API retries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryBackoff {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Lifetime of a cached compilation result.
    pub preview_ttl_secs: u64,
    pub preview_cache_capacity: usize,
    pub slot_cache_capacity: usize,
    /// Price per 1,000 estimated tokens.
    pub unit_cost_per_1k: f64,
    pub base_latency_ms: f64,
    pub latency_per_token_ms: f64,
    /// Token count above which compression is suggested.
    pub token_high_water: usize,
    /// Quality below which adding examples is suggested.
    pub quality_floor: f64,
    /// Compile time above which caching is suggested.
    pub slow_compile_ms: u64,
    /// Compiled prompts longer than this (in characters) are flagged.
    pub max_output_chars: usize,
    pub max_concurrent_requests: usize,
    pub retry_backoff: RetryBackoff,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_ttl_secs: 300,
            preview_cache_capacity: 128,
            slot_cache_capacity: 512,
            unit_cost_per_1k: 0.002,
            base_latency_ms: 250.0,
            latency_per_token_ms: 1.5,
            token_high_water: 2_000,
            quality_floor: 0.6,
            slow_compile_ms: 1_000,
            max_output_chars: 32_000,
            max_concurrent_requests: 8,
            retry_backoff: RetryBackoff::default(),
        }
    }
}

impl EngineConfig {
    /// Load overrides from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn preview_ttl(&self) -> Duration {
        Duration::from_secs(self.preview_ttl_secs)
    }

    pub fn with_preview_ttl(mut self, ttl: Duration) -> Self {
        self.preview_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_unit_cost(mut self, per_1k_tokens: f64) -> Self {
        self.unit_cost_per_1k = per_1k_tokens;
        self
    }

    pub fn with_latency_model(mut self, base_ms: f64, per_token_ms: f64) -> Self {
        self.base_latency_ms = base_ms;
        self.latency_per_token_ms = per_token_ms;
        self
    }

    pub fn with_token_high_water(mut self, tokens: usize) -> Self {
        self.token_high_water = tokens;
        self
    }

    pub fn with_quality_floor(mut self, floor: f64) -> Self {
        self.quality_floor = floor;
        self
    }

    pub fn with_slow_compile_threshold(mut self, threshold: Duration) -> Self {
        self.slow_compile_ms = threshold.as_millis() as u64;
        self
    }

    pub fn with_max_output_chars(mut self, chars: usize) -> Self {
        self.max_output_chars = chars;
        self
    }

    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n.max(1);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"unitCostPer1k": 0.01, "retryBackoff": {{"multiplier": 3.0}}}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.unit_cost_per_1k, 0.01);
        assert_eq!(config.retry_backoff.multiplier, 3.0);
        assert_eq!(config.retry_backoff.initial_delay_ms, 200);
        assert_eq!(config.preview_ttl_secs, 300);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_json_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::Json(_)));
    }

    #[test]
    fn builder_methods() {
        let config = EngineConfig::default()
            .with_preview_ttl(Duration::from_secs(60))
            .with_max_concurrent_requests(0)
            .with_latency_model(100.0, 2.0);
        assert_eq!(config.preview_ttl(), Duration::from_secs(60));
        assert_eq!(config.max_concurrent_requests, 1);
        assert_eq!(config.base_latency_ms, 100.0);
    }
}
