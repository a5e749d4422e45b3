//! Error types
//!
//! Only the read path surfaces errors to callers. Write-path failures are
//! reported through `WriteOutcome` and the logs instead.

use crate::breaker::{ResourceKey, Strategy};
use thiserror::Error;

/// Errors produced while executing a cross-room operation
#[derive(Debug, Error)]
pub enum CrossRoomError {
    /// The resource is currently degraded and rejected the call
    #[error("circuit breaker open for {0}")]
    BreakerOpen(ResourceKey),

    /// The region call itself failed
    #[error("{resource} execution failed: {source}")]
    ExecutionFailure {
        resource: ResourceKey,
        #[source]
        source: anyhow::Error,
    },

    /// Major was unavailable and the minor read breaker is open
    #[error("read fallback to minor region blocked")]
    ReadFallbackBlocked,
}

impl CrossRoomError {
    /// The resource key this error is attributed to, if any
    pub fn resource(&self) -> Option<ResourceKey> {
        match self {
            CrossRoomError::BreakerOpen(key) => Some(*key),
            CrossRoomError::ExecutionFailure { resource, .. } => Some(*resource),
            CrossRoomError::ReadFallbackBlocked => None,
        }
    }
}

/// A degrade rule that cannot be installed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("{strategy} threshold for {resource} must be within [0, 1], got {threshold}")]
    ThresholdOutOfRange {
        resource: ResourceKey,
        strategy: Strategy,
        threshold: f64,
    },

    #[error("window for {0} must be at least one second")]
    EmptyWindow(ResourceKey),

    #[error("window for {resource} is too long: {window_seconds}s")]
    WindowTooLong {
        resource: ResourceKey,
        window_seconds: u64,
    },

    #[error("slow request threshold for {0} must be positive")]
    MissingSlowThreshold(ResourceKey),

    #[error("minimum request amount for {0} must be positive")]
    ZeroMinRequests(ResourceKey),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_resource_attribution() {
        let err = CrossRoomError::ExecutionFailure {
            resource: ResourceKey::MinorRead,
            source: anyhow::anyhow!("connection refused"),
        };
        assert_eq!(err.resource(), Some(ResourceKey::MinorRead));
        assert_eq!(
            err.to_string(),
            "minor-read execution failed: connection refused"
        );

        assert_eq!(
            CrossRoomError::BreakerOpen(ResourceKey::MajorWrite).resource(),
            Some(ResourceKey::MajorWrite)
        );
        assert_eq!(CrossRoomError::ReadFallbackBlocked.resource(), None);
    }
}
