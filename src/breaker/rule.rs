//! Degrade rules and the resources they guard

use crate::error::RuleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default slow-call threshold (ms)
pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 1000;

/// Default ratio for both strategies
pub const DEFAULT_RATIO: f64 = 0.5;

/// Default statistics window and open duration (seconds)
pub const DEFAULT_WINDOW_SECONDS: u64 = 5;

/// Default minimum number of calls in a window before a rule may trip
pub const DEFAULT_MIN_REQUEST_AMOUNT: u64 = 5;

/// The four independently tracked breaker buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKey {
    MajorRead,
    MajorWrite,
    MinorRead,
    MinorWrite,
}

impl ResourceKey {
    pub const ALL: [ResourceKey; 4] = [
        ResourceKey::MajorRead,
        ResourceKey::MajorWrite,
        ResourceKey::MinorRead,
        ResourceKey::MinorWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKey::MajorRead => "major-read",
            ResourceKey::MajorWrite => "major-write",
            ResourceKey::MinorRead => "minor-read",
            ResourceKey::MinorWrite => "minor-write",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule judges a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Trip when failed calls / total calls reaches the threshold
    ErrorRatio,
    /// Trip when slow calls / total calls reaches the threshold
    SlowRequestRatio,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::ErrorRatio => f.write_str("error ratio"),
            Strategy::SlowRequestRatio => f.write_str("slow request ratio"),
        }
    }
}

/// A circuit-breaking rule for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradeRule {
    pub resource: ResourceKey,

    pub strategy: Strategy,

    /// Ratio in [0, 1] at which the rule trips
    pub threshold: f64,

    /// Length of the statistics window, and how long the resource stays open
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Calls taking at least this long count as slow
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,

    /// Minimum sample size before the ratio is considered
    #[serde(default = "default_min_request_amount")]
    pub min_request_amount: u64,
}

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

fn default_slow_threshold_ms() -> u64 {
    DEFAULT_SLOW_THRESHOLD_MS
}

fn default_min_request_amount() -> u64 {
    DEFAULT_MIN_REQUEST_AMOUNT
}

impl DegradeRule {
    /// Error-ratio rule with default window and sample size
    pub fn error_ratio(resource: ResourceKey, threshold: f64) -> Self {
        DegradeRule {
            resource,
            strategy: Strategy::ErrorRatio,
            threshold,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            min_request_amount: DEFAULT_MIN_REQUEST_AMOUNT,
        }
    }

    /// Slow-ratio rule with default window and sample size
    pub fn slow_ratio(resource: ResourceKey, threshold: f64, slow_threshold_ms: u64) -> Self {
        DegradeRule {
            resource,
            strategy: Strategy::SlowRequestRatio,
            threshold,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            slow_threshold_ms,
            min_request_amount: DEFAULT_MIN_REQUEST_AMOUNT,
        }
    }

    pub fn with_window_seconds(mut self, window_seconds: u64) -> Self {
        self.window_seconds = window_seconds;
        self
    }

    pub fn with_min_request_amount(mut self, min_request_amount: u64) -> Self {
        self.min_request_amount = min_request_amount;
        self
    }

    /// The eight rules installed when no configuration is given:
    /// error and slow ratio for each of the four resources
    pub fn defaults() -> Vec<DegradeRule> {
        ResourceKey::ALL
            .iter()
            .flat_map(|&key| {
                [
                    DegradeRule::error_ratio(key, DEFAULT_RATIO),
                    DegradeRule::slow_ratio(key, DEFAULT_RATIO, DEFAULT_SLOW_THRESHOLD_MS),
                ]
            })
            .collect()
    }

    /// Reject rules that could never behave sensibly
    pub fn validate(&self) -> Result<(), RuleError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(RuleError::ThresholdOutOfRange {
                resource: self.resource,
                strategy: self.strategy,
                threshold: self.threshold,
            });
        }

        if self.window_seconds == 0 {
            return Err(RuleError::EmptyWindow(self.resource));
        }

        if self.window_seconds.checked_mul(1000).is_none() {
            return Err(RuleError::WindowTooLong {
                resource: self.resource,
                window_seconds: self.window_seconds,
            });
        }

        if self.min_request_amount == 0 {
            return Err(RuleError::ZeroMinRequests(self.resource));
        }

        if self.strategy == Strategy::SlowRequestRatio && self.slow_threshold_ms == 0 {
            return Err(RuleError::MissingSlowThreshold(self.resource));
        }

        Ok(())
    }

    pub(crate) fn window_millis(&self) -> u64 {
        self.window_seconds.saturating_mul(1000)
    }
}
