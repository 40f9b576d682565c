use std::collections::VecDeque;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Samples kept per strategy; older ones are dropped first.
pub const MAX_SAMPLES: usize = 100;

/// Minimum history length before a trend is reported, whatever the
/// strategy's `min_samples`.
const TREND_FLOOR: usize = 10;
const TREND_WINDOW: usize = 5;
const TREND_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub original_length: usize,
    pub compressed_length: usize,
    pub quality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

/// Bounded record of past compressions for one strategy.
#[derive(Debug, Clone, Default)]
pub struct History {
    samples: VecDeque<Sample>,
}

impl History {
    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        let mut history = Self::default();
        for sample in samples {
            history.record(sample);
        }
        history
    }

    pub fn record(&mut self, sample: Sample) {
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Compare the mean quality of the last five samples with the five
    /// before them.
    pub fn trend(&self, min_samples: usize) -> Trend {
        if self.samples.len() < min_samples.max(TREND_FLOOR) {
            return Trend::Stable;
        }
        let n = self.samples.len();
        let mean = |range: std::ops::Range<usize>| {
            range.clone().map(|i| self.samples[i].quality).sum::<f64>() / range.len() as f64
        };
        let recent = mean(n - TREND_WINDOW..n);
        let previous = mean(n - 2 * TREND_WINDOW..n - TREND_WINDOW);
        let delta = recent - previous;
        if delta > TREND_THRESHOLD {
            Trend::Improving
        } else if delta < -TREND_THRESHOLD {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}
