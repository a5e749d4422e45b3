//! Circuit breaker module
//!
//! Tracks call outcomes per resource in rolling windows and decides whether
//! calls to a resource are currently allowed. Each degrade rule gets its own
//! window and state machine:
//!
//! ```text
//! Closed --[ratio >= threshold, total > min requests]---> Open
//! Open   --[open_until elapsed, next allow()]-----------> HalfOpen (one trial call)
//! HalfOpen --[trial ok]--> Closed (fresh window)
//! HalfOpen --[trial bad]-> Open
//! ```
//!
//! A resource is allowed only if all of its rules allow. Resources without
//! rules are always allowed.

mod clock;
mod rule;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rule::{
    DegradeRule, ResourceKey, Strategy, DEFAULT_MIN_REQUEST_AMOUNT, DEFAULT_RATIO,
    DEFAULT_SLOW_THRESHOLD_MS, DEFAULT_WINDOW_SECONDS,
};
pub use window::WindowSnapshot;

use crate::error::RuleError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{info, warn};
use window::SlidingWindow;

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open { until: u64 },
    /// Trial call in flight; `until` is the expired deadline, restored if the
    /// trial is handed back
    HalfOpen { until: u64 },
}

enum Pass {
    Allowed,
    Trial,
    Rejected,
}

#[derive(Debug)]
struct RuleState {
    window: SlidingWindow,
    phase: Phase,
}

/// One rule's window and state machine
#[derive(Debug)]
struct RuleBreaker {
    rule: DegradeRule,
    state: Mutex<RuleState>,
}

impl RuleBreaker {
    fn new(rule: DegradeRule) -> Self {
        let window = SlidingWindow::new(rule.window_millis());
        RuleBreaker {
            rule,
            state: Mutex::new(RuleState {
                window,
                phase: Phase::Closed,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RuleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_pass(&self, now: u64) -> Pass {
        let mut state = self.lock();
        match state.phase {
            Phase::Closed => {
                let snap = state.window.snapshot(now);
                // The sample must exceed the minimum before the ratio counts
                if snap.total <= self.rule.min_request_amount {
                    return Pass::Allowed;
                }

                let observed = match self.rule.strategy {
                    Strategy::ErrorRatio => snap.error_ratio(),
                    Strategy::SlowRequestRatio => snap.slow_ratio(),
                };
                if observed >= self.rule.threshold {
                    let until = now.saturating_add(self.rule.window_millis());
                    state.phase = Phase::Open { until };
                    warn!(
                        "{} opened by {} rule: {:.2} >= {:.2} over {} calls, open for {}s",
                        self.rule.resource,
                        self.rule.strategy,
                        observed,
                        self.rule.threshold,
                        snap.total,
                        self.rule.window_seconds
                    );
                    return Pass::Rejected;
                }

                Pass::Allowed
            }
            Phase::Open { until } if now >= until => {
                state.phase = Phase::HalfOpen { until };
                info!("{} half-open, allowing one trial call", self.rule.resource);
                Pass::Trial
            }
            Phase::Open { .. } | Phase::HalfOpen { .. } => Pass::Rejected,
        }
    }

    /// Undo a trial grant when another rule rejected the same call
    fn release_trial(&self) {
        let mut state = self.lock();
        if let Phase::HalfOpen { until } = state.phase {
            state.phase = Phase::Open { until };
        }
    }

    fn on_complete(&self, now: u64, succeeded: bool, duration_ms: u64) {
        let slow = duration_ms >= self.rule.slow_threshold_ms;
        let bad = match self.rule.strategy {
            Strategy::ErrorRatio => !succeeded,
            Strategy::SlowRequestRatio => slow,
        };

        let mut state = self.lock();
        state.window.record(now, succeeded, slow);

        if let Phase::HalfOpen { .. } = state.phase {
            if bad {
                state.phase = Phase::Open {
                    until: now.saturating_add(self.rule.window_millis()),
                };
                warn!(
                    "{} trial call failed ({} rule), open for another {}s",
                    self.rule.resource, self.rule.strategy, self.rule.window_seconds
                );
            } else {
                state.phase = Phase::Closed;
                state.window.reset();
                info!("{} recovered, breaker closed", self.rule.resource);
            }
        }
    }

    fn state(&self) -> BreakerState {
        match self.lock().phase {
            Phase::Closed => BreakerState::Closed,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }
}

type RuleTable = HashMap<ResourceKey, Vec<Arc<RuleBreaker>>>;

/// Circuit breaker over the four cross-room resources
///
/// Shared by every caller and replication worker; all counters live behind
/// the breaker's own locks.
#[derive(Debug)]
pub struct CircuitBreaker {
    rules: RwLock<RuleTable>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a breaker with no rules, using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a breaker with no rules, using the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        CircuitBreaker {
            rules: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Create a breaker and install a rule set
    pub fn with_rules(rules: &[DegradeRule], clock: Arc<dyn Clock>) -> Result<Self, RuleError> {
        let breaker = Self::with_clock(clock);
        breaker.load_rules(rules)?;
        Ok(breaker)
    }

    /// Install or replace the rule for `(rule.resource, rule.strategy)`
    pub fn configure(&self, rule: DegradeRule) -> Result<(), RuleError> {
        rule.validate()?;

        let strategy = rule.strategy;
        let mut table = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let list = table.entry(rule.resource).or_default();
        let breaker = Arc::new(RuleBreaker::new(rule));
        match list.iter_mut().find(|b| b.rule.strategy == strategy) {
            Some(existing) => *existing = breaker,
            None => list.push(breaker),
        }
        Ok(())
    }

    /// Replace the whole rule set. Nothing is installed if any rule is invalid.
    pub fn load_rules(&self, rules: &[DegradeRule]) -> Result<(), RuleError> {
        for rule in rules {
            rule.validate()?;
        }

        let mut table: RuleTable = HashMap::new();
        for rule in rules {
            let list = table.entry(rule.resource).or_default();
            list.retain(|b| b.rule.strategy != rule.strategy);
            list.push(Arc::new(RuleBreaker::new(rule.clone())));
        }

        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = table;
        info!("Loaded {} degrade rules", rules.len());
        Ok(())
    }

    /// Whether a call to `key` may proceed right now
    pub fn allow(&self, key: ResourceKey) -> bool {
        let table = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = table.get(&key) else {
            return true;
        };

        let now = self.clock.now_millis();
        let mut trials = Vec::new();
        for breaker in list {
            match breaker.try_pass(now) {
                Pass::Allowed => {}
                Pass::Trial => trials.push(breaker),
                Pass::Rejected => {
                    trials.iter().for_each(|b| b.release_trial());
                    return false;
                }
            }
        }
        true
    }

    /// Record the outcome of a call that `allow` let through
    pub fn record(&self, key: ResourceKey, succeeded: bool, duration_ms: u64) {
        let table = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = table.get(&key) {
            let now = self.clock.now_millis();
            for breaker in list {
                breaker.on_complete(now, succeeded, duration_ms);
            }
        }
    }

    /// Most restrictive state across the resource's rules
    pub fn state(&self, key: ResourceKey) -> BreakerState {
        let table = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let states: Vec<BreakerState> = table
            .get(&key)
            .map(|list| list.iter().map(|b| b.state()).collect())
            .unwrap_or_default();

        if states.contains(&BreakerState::Open) {
            BreakerState::Open
        } else if states.contains(&BreakerState::HalfOpen) {
            BreakerState::HalfOpen
        } else {
            BreakerState::Closed
        }
    }

    /// Current window counters of one rule
    pub fn snapshot(&self, key: ResourceKey, strategy: Strategy) -> Option<WindowSnapshot> {
        let table = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_millis();
        table
            .get(&key)?
            .iter()
            .find(|b| b.rule.strategy == strategy)
            .map(|b| b.lock().window.snapshot(now))
    }

    /// Rules installed for a resource
    pub fn rules(&self, key: ResourceKey) -> Vec<DegradeRule> {
        let table = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        table
            .get(&key)
            .map(|list| list.iter().map(|b| b.rule.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn breaker_with(rules: &[DegradeRule]) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::with_rules(rules, Arc::new(clock.clone())).unwrap();
        (breaker, clock)
    }

    #[test]
    fn test_unconfigured_resource_always_allows() {
        let breaker = CircuitBreaker::new();
        for _ in 0..100 {
            breaker.record(ResourceKey::MajorRead, false, 5000);
        }
        assert!(breaker.allow(ResourceKey::MajorRead));
        assert_eq!(breaker.state(ResourceKey::MajorRead), BreakerState::Closed);
    }

    #[test]
    fn test_configure_rejects_malformed_rule() {
        let breaker = CircuitBreaker::new();
        let rule = DegradeRule::error_ratio(ResourceKey::MajorRead, -0.1);
        assert!(breaker.configure(rule).is_err());
        assert!(breaker.rules(ResourceKey::MajorRead).is_empty());
    }

    #[test]
    fn test_configure_replaces_same_strategy() {
        let breaker = CircuitBreaker::new();
        breaker
            .configure(DegradeRule::error_ratio(ResourceKey::MinorRead, 0.5))
            .unwrap();
        breaker
            .configure(DegradeRule::error_ratio(ResourceKey::MinorRead, 0.8))
            .unwrap();
        breaker
            .configure(DegradeRule::slow_ratio(ResourceKey::MinorRead, 0.5, 200))
            .unwrap();

        let rules = breaker.rules(ResourceKey::MinorRead);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].threshold, 0.8);
    }

    #[test]
    fn test_needs_minimum_samples_before_tripping() {
        let (breaker, _clock) =
            breaker_with(&[DegradeRule::error_ratio(ResourceKey::MajorRead, 0.5)]);

        for _ in 0..5 {
            assert!(breaker.allow(ResourceKey::MajorRead));
            breaker.record(ResourceKey::MajorRead, false, 1);
        }
        // 5 failures only reach the minimum of 5
        assert!(breaker.allow(ResourceKey::MajorRead));
        breaker.record(ResourceKey::MajorRead, false, 1);

        assert!(!breaker.allow(ResourceKey::MajorRead));
        assert_eq!(breaker.state(ResourceKey::MajorRead), BreakerState::Open);
    }

    #[test]
    fn test_custom_minimum_samples() {
        let rule =
            DegradeRule::error_ratio(ResourceKey::MinorRead, 0.5).with_min_request_amount(2);
        let (breaker, _clock) = breaker_with(&[rule]);

        breaker.record(ResourceKey::MinorRead, false, 1);
        breaker.record(ResourceKey::MinorRead, false, 1);
        assert!(breaker.allow(ResourceKey::MinorRead));

        breaker.record(ResourceKey::MinorRead, false, 1);
        assert!(!breaker.allow(ResourceKey::MinorRead));
    }

    #[test]
    fn test_huge_window_opens_without_overflow() {
        let rule = DegradeRule::error_ratio(ResourceKey::MajorWrite, 0.5)
            .with_window_seconds(u64::MAX / 1000);
        let (breaker, clock) = breaker_with(&[rule]);
        clock.advance(Duration::from_secs(60));

        for _ in 0..6 {
            breaker.record(ResourceKey::MajorWrite, false, 1);
        }
        assert!(!breaker.allow(ResourceKey::MajorWrite));
        assert_eq!(breaker.state(ResourceKey::MajorWrite), BreakerState::Open);
    }

    #[test]
    fn test_below_threshold_stays_closed() {
        let (breaker, _clock) =
            breaker_with(&[DegradeRule::error_ratio(ResourceKey::MajorWrite, 0.5)]);

        for i in 0..10 {
            breaker.record(ResourceKey::MajorWrite, i % 3 != 0, 1);
        }
        // 4 errors out of 10
        assert!(breaker.allow(ResourceKey::MajorWrite));
    }

    #[test]
    fn test_slow_ratio_trips() {
        let (breaker, _clock) =
            breaker_with(&[DegradeRule::slow_ratio(ResourceKey::MinorWrite, 0.5, 1000)]);

        for _ in 0..6 {
            breaker.record(ResourceKey::MinorWrite, true, 1000);
        }
        assert!(!breaker.allow(ResourceKey::MinorWrite));
        assert_eq!(
            breaker.snapshot(ResourceKey::MinorWrite, Strategy::SlowRequestRatio),
            Some(WindowSnapshot { total: 6, errors: 0, slow: 6 })
        );
    }

    #[test]
    fn test_half_open_single_trial_then_close() {
        let (breaker, clock) =
            breaker_with(&[DegradeRule::error_ratio(ResourceKey::MajorRead, 0.5)]);

        for _ in 0..6 {
            breaker.record(ResourceKey::MajorRead, false, 1);
        }
        assert!(!breaker.allow(ResourceKey::MajorRead));

        clock.advance(Duration::from_secs(4));
        assert!(!breaker.allow(ResourceKey::MajorRead));

        clock.advance(Duration::from_secs(1));
        assert!(breaker.allow(ResourceKey::MajorRead));
        // Only one trial while it is in flight
        assert!(!breaker.allow(ResourceKey::MajorRead));
        assert_eq!(breaker.state(ResourceKey::MajorRead), BreakerState::HalfOpen);

        breaker.record(ResourceKey::MajorRead, true, 1);
        assert_eq!(breaker.state(ResourceKey::MajorRead), BreakerState::Closed);
        assert!(breaker.allow(ResourceKey::MajorRead));
        assert_eq!(
            breaker.snapshot(ResourceKey::MajorRead, Strategy::ErrorRatio),
            Some(WindowSnapshot::default())
        );
    }

    #[test]
    fn test_failed_trial_reopens() {
        let (breaker, clock) =
            breaker_with(&[DegradeRule::error_ratio(ResourceKey::MinorRead, 0.5)]);

        for _ in 0..6 {
            breaker.record(ResourceKey::MinorRead, false, 1);
        }
        assert!(!breaker.allow(ResourceKey::MinorRead));

        clock.advance(Duration::from_secs(5));
        assert!(breaker.allow(ResourceKey::MinorRead));
        breaker.record(ResourceKey::MinorRead, false, 1);
        assert_eq!(breaker.state(ResourceKey::MinorRead), BreakerState::Open);

        clock.advance(Duration::from_secs(1));
        assert!(!breaker.allow(ResourceKey::MinorRead));
    }

    #[test]
    fn test_trial_handed_back_when_other_rule_rejects() {
        let (breaker, clock) = breaker_with(&[
            DegradeRule::error_ratio(ResourceKey::MajorRead, 0.5).with_window_seconds(1),
            DegradeRule::slow_ratio(ResourceKey::MajorRead, 0.5, 100).with_window_seconds(10),
        ]);

        for _ in 0..6 {
            breaker.record(ResourceKey::MajorRead, false, 500);
        }
        assert!(!breaker.allow(ResourceKey::MajorRead));
        assert!(!breaker.allow(ResourceKey::MajorRead));

        // Error rule is past its open period, slow rule is not
        clock.advance(Duration::from_secs(2));
        assert!(!breaker.allow(ResourceKey::MajorRead));
        assert_eq!(breaker.state(ResourceKey::MajorRead), BreakerState::Open);

        // Slow rule opened at t=2s for 10s
        clock.advance(Duration::from_secs(9));
        assert!(!breaker.allow(ResourceKey::MajorRead));

        clock.advance(Duration::from_secs(1));
        assert!(breaker.allow(ResourceKey::MajorRead));
        assert_eq!(breaker.state(ResourceKey::MajorRead), BreakerState::HalfOpen);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let breaker = Arc::new(
            CircuitBreaker::with_rules(
                &[DegradeRule::error_ratio(ResourceKey::MajorWrite, 0.5)],
                Arc::new(ManualClock::new()),
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let breaker = breaker.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        breaker.record(ResourceKey::MajorWrite, i % 10 >= 3, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = breaker
            .snapshot(ResourceKey::MajorWrite, Strategy::ErrorRatio)
            .unwrap();
        assert_eq!(snap.total, 10_000);
        assert_eq!(snap.errors, 3_000);
        assert!((snap.error_ratio() - 0.30).abs() < 1e-9);
    }
}
