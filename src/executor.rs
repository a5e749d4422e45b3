//! Cross-room command executor
//!
//! Reads go to the major region and fall back to the minor region once.
//! Writes go to the major region synchronously and are mirrored to the minor
//! region on the replication pool. Every region call is gated and recorded by
//! the circuit breaker under its resource key.

use crate::breaker::{CircuitBreaker, ResourceKey};
use crate::error::CrossRoomError;
use crate::operation::{OpKind, Operation};
use crate::outcome::WriteOutcome;
use crate::region::Region;
use crate::replicator::{AsyncReplicator, PendingReplication};
use crate::topology::CrossRoomTopology;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Result of a write on both regions
#[derive(Debug)]
pub struct WriteResult<T> {
    /// What happened on the major region
    pub major: WriteOutcome<T>,
    /// The minor-region mirror, still running or already finished
    pub minor: PendingReplication<T>,
}

impl<T> WriteResult<T> {
    /// Major value, or `T::default()` if the major write did not apply
    pub fn into_value_or_default(self) -> T
    where
        T: Default,
    {
        self.major.into_value_or_default()
    }
}

/// Result of `CommandExecutor::execute`
#[derive(Debug)]
pub enum Executed<T> {
    Read(T),
    Write(WriteResult<T>),
}

/// Routes operations across the major and minor regions
pub struct CommandExecutor<R: Region> {
    major: Arc<R>,
    minor: Arc<R>,
    breaker: Arc<CircuitBreaker>,
    replicator: AsyncReplicator,
}

impl<R: Region> CommandExecutor<R> {
    /// Create an executor with a replication pool of `pool_size` workers
    pub fn new(
        major: Arc<R>,
        minor: Arc<R>,
        breaker: Arc<CircuitBreaker>,
        pool_size: usize,
    ) -> anyhow::Result<Self> {
        let replicator = AsyncReplicator::new(pool_size)?;
        Ok(CommandExecutor {
            major,
            minor,
            breaker,
            replicator,
        })
    }

    /// Execute an operation according to its kind
    ///
    /// Only reads can fail; write failures are reported in the `WriteResult`.
    pub fn execute<T>(&self, op: &Operation<R, T>) -> Result<Executed<T>, CrossRoomError>
    where
        T: Send + 'static,
    {
        match op.kind() {
            OpKind::Read => self.read(op).map(Executed::Read),
            OpKind::Write => Ok(Executed::Write(self.write(op))),
        }
    }

    /// Execute and keep only the value
    ///
    /// A write that did not apply on the major region yields `T::default()`.
    /// The minor replication keeps running in the background.
    pub fn run<T>(&self, op: &Operation<R, T>) -> Result<T, CrossRoomError>
    where
        T: Default + Send + 'static,
    {
        match self.execute(op)? {
            Executed::Read(value) => Ok(value),
            Executed::Write(result) => Ok(result.into_value_or_default()),
        }
    }

    /// Read from major, falling back to minor at most once
    pub fn read<T>(&self, op: &Operation<R, T>) -> Result<T, CrossRoomError> {
        let (result, elapsed) = attempt(&self.breaker, ResourceKey::MajorRead, &*self.major, op);
        let cause = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match &cause {
            CrossRoomError::BreakerOpen(_) => {
                warn!("major-read degraded, reading from minor: {}", op.descriptor())
            }
            _ => warn!(
                "major-read failed after {}ms, reading from minor: {}: {}",
                elapsed,
                op.descriptor(),
                cause
            ),
        }

        match attempt(&self.breaker, ResourceKey::MinorRead, &*self.minor, op) {
            (Ok(value), _) => Ok(value),
            (Err(CrossRoomError::BreakerOpen(_)), _) => {
                error!("major and minor reads both degraded: {}", op.descriptor());
                Err(CrossRoomError::ReadFallbackBlocked)
            }
            (Err(e), elapsed) => {
                error!(
                    "minor-read failed after {}ms: {}: {}",
                    elapsed,
                    op.descriptor(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Write to major and mirror to minor
    ///
    /// The mirror is handed to the replication pool before the major call
    /// starts and is never awaited here.
    pub fn write<T>(&self, op: &Operation<R, T>) -> WriteResult<T>
    where
        T: Send + 'static,
    {
        let minor = {
            let region = Arc::clone(&self.minor);
            let breaker = Arc::clone(&self.breaker);
            let op = op.clone();
            self.replicator.submit(move || {
                let (result, elapsed) = attempt(&breaker, ResourceKey::MinorWrite, &*region, &op);
                into_outcome(ResourceKey::MinorWrite, result, elapsed, op.descriptor())
            })
        };

        let (result, elapsed) = attempt(&self.breaker, ResourceKey::MajorWrite, &*self.major, op);
        let major = into_outcome(ResourceKey::MajorWrite, result, elapsed, op.descriptor());

        WriteResult { major, minor }
    }

    /// Member lists of both regions
    pub fn topology(&self) -> CrossRoomTopology {
        CrossRoomTopology::capture(&*self.major, &*self.minor)
    }

    pub fn major(&self) -> &Arc<R> {
        &self.major
    }

    pub fn minor(&self) -> &Arc<R> {
        &self.minor
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Number of replication workers
    pub fn pool_size(&self) -> usize {
        self.replicator.size()
    }

    /// Stop the replication pool, letting in-flight mirrors finish
    pub fn shutdown(self) {
        self.replicator.shutdown();
    }
}

/// One gated, timed and recorded call against a region
///
/// Every call `allow` lets through is recorded, including one that panics,
/// so a half-open trial is always resolved.
fn attempt<R, T>(
    breaker: &CircuitBreaker,
    key: ResourceKey,
    region: &R,
    op: &Operation<R, T>,
) -> (Result<T, CrossRoomError>, u64) {
    if !breaker.allow(key) {
        return (Err(CrossRoomError::BreakerOpen(key)), 0);
    }

    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| op.execute_on(region)))
        .unwrap_or_else(|payload| Err(panicked(payload.as_ref())));
    let elapsed = start.elapsed().as_millis() as u64;
    breaker.record(key, result.is_ok(), elapsed);

    let result = result.map_err(|source| CrossRoomError::ExecutionFailure {
        resource: key,
        source,
    });
    (result, elapsed)
}

fn panicked(payload: &(dyn Any + Send)) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    anyhow::anyhow!("region call panicked: {}", message)
}

fn into_outcome<T>(
    key: ResourceKey,
    result: Result<T, CrossRoomError>,
    elapsed: u64,
    descriptor: &str,
) -> WriteOutcome<T> {
    match result {
        Ok(value) => WriteOutcome::Applied(value),
        Err(CrossRoomError::BreakerOpen(_)) => {
            warn!("{} degraded, write skipped: {}", key, descriptor);
            WriteOutcome::Blocked
        }
        Err(CrossRoomError::ExecutionFailure { source, .. }) => {
            error!(
                "{} failed after {}ms: {}: {:#}",
                key, elapsed, descriptor, source
            );
            WriteOutcome::Failed(source)
        }
        Err(other) => {
            error!("{} failed: {}: {}", key, descriptor, other);
            WriteOutcome::Failed(other.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{DegradeRule, ManualClock, Strategy};
    use crate::commands;
    use crate::region::{KeyValueStore, MemoryRegion};
    use bytes::Bytes;
    use std::time::Duration;

    struct Fixture {
        executor: CommandExecutor<MemoryRegion>,
        major: Arc<MemoryRegion>,
        minor: Arc<MemoryRegion>,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new();
        let breaker =
            CircuitBreaker::with_rules(&DegradeRule::defaults(), Arc::new(clock.clone())).unwrap();
        let major = Arc::new(MemoryRegion::new("major"));
        let minor = Arc::new(MemoryRegion::new("minor"));
        let executor =
            CommandExecutor::new(major.clone(), minor.clone(), Arc::new(breaker), 4).unwrap();
        Fixture {
            executor,
            major,
            minor,
            clock,
        }
    }

    fn seed(region: &MemoryRegion, key: &str, value: &str) {
        region.set(&Bytes::from(key.to_string()), &Bytes::from(value.to_string())).unwrap();
    }

    #[test]
    fn test_read_served_by_major() {
        let f = fixture();
        seed(&f.major, "k", "major");
        seed(&f.minor, "k", "minor");

        let value = f.executor.read(&commands::get("k")).unwrap();
        assert_eq!(value, Some(Bytes::from("major")));
        assert_eq!(f.minor.calls(), 1);
    }

    #[test]
    fn test_read_fails_over_once() {
        let f = fixture();
        seed(&f.minor, "k", "minor");
        f.major.set_failing(true);

        let value = f.executor.read(&commands::get("k")).unwrap();
        assert_eq!(value, Some(Bytes::from("minor")));

        let snap = f
            .executor
            .breaker()
            .snapshot(ResourceKey::MajorRead, Strategy::ErrorRatio)
            .unwrap();
        assert_eq!(snap.total, 1);
        assert_eq!(snap.errors, 1);
    }

    #[test]
    fn test_minor_read_error_propagates() {
        let f = fixture();
        f.major.set_failing(true);
        f.minor.set_failing(true);

        let err = f.executor.read(&commands::get("k")).unwrap_err();
        assert!(matches!(
            err,
            CrossRoomError::ExecutionFailure {
                resource: ResourceKey::MinorRead,
                ..
            }
        ));
        assert_eq!(f.major.calls(), 1);
    }

    #[test]
    fn test_tripped_breaker_skips_major() {
        let f = fixture();
        seed(&f.minor, "k", "minor");
        f.major.set_failing(true);

        for _ in 0..6 {
            assert!(f.executor.read(&commands::get("k")).is_ok());
        }
        assert_eq!(f.major.calls(), 6);

        for _ in 0..10 {
            assert!(f.executor.read(&commands::get("k")).is_ok());
        }
        assert_eq!(f.major.calls(), 6);
        assert_eq!(
            f.executor.breaker().state(ResourceKey::MajorRead),
            crate::breaker::BreakerState::Open
        );
    }

    #[test]
    fn test_half_open_recovery() {
        let f = fixture();
        seed(&f.major, "k", "major");
        let seeded = f.major.calls();
        f.major.set_failing(true);
        for _ in 0..7 {
            let _ = f.executor.read(&commands::get("k"));
        }
        assert_eq!(f.major.calls(), seeded + 6);

        f.major.set_failing(false);
        f.clock.advance(Duration::from_secs(5));

        let value = f.executor.read(&commands::get("k")).unwrap();
        assert_eq!(value, Some(Bytes::from("major")));
        assert_eq!(
            f.executor.breaker().state(ResourceKey::MajorRead),
            crate::breaker::BreakerState::Closed
        );

        f.executor.read(&commands::get("k")).unwrap();
        assert_eq!(f.major.calls(), seeded + 8);
    }

    #[test]
    fn test_both_reads_degraded() {
        let f = fixture();
        f.major.set_failing(true);
        f.minor.set_failing(true);

        for _ in 0..6 {
            assert!(f.executor.read(&commands::get("k")).is_err());
        }

        let err = f.executor.read(&commands::get("k")).unwrap_err();
        assert!(matches!(err, CrossRoomError::ReadFallbackBlocked));
        assert_eq!(f.major.calls(), 6);
        assert_eq!(f.minor.calls(), 6);
    }

    #[test]
    fn test_write_fans_out() {
        let f = fixture();
        let result = f.executor.write(&commands::set("k", "v"));
        assert!(result.major.is_applied());
        assert!(result.minor.wait().is_applied());

        assert!(f.major.peek("k").is_some());
        assert!(f.minor.peek("k").is_some());
    }

    #[test]
    fn test_write_does_not_wait_for_minor() {
        let f = fixture();
        f.minor.set_latency(Duration::from_secs(2));

        let start = Instant::now();
        let mut result = f.executor.write(&commands::set("k", "v"));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(result.major.is_applied());
        assert!(result.minor.try_outcome().is_none());
    }

    #[test]
    fn test_major_write_failure_reported() {
        let f = fixture();
        f.major.set_failing(true);

        let result = f.executor.write(&commands::incr("counter"));
        assert!(result.major.is_failed());
        assert_eq!(result.minor.wait().into_value(), Some(1));
    }

    #[test]
    fn test_out_of_range_ttl_write_fails_on_both_regions() {
        let f = fixture();
        let result = f.executor.write(&commands::set_ex("k", u64::MAX, "v"));
        assert!(result.major.is_failed());
        assert!(result.minor.wait().is_failed());
        assert!(f.major.peek("k").is_none());
    }

    #[test]
    fn test_major_write_blocked() {
        let f = fixture();
        f.major.set_failing(true);
        for _ in 0..6 {
            let result = f.executor.write(&commands::del("k"));
            assert!(result.major.is_failed());
            result.minor.wait();
        }

        let result = f.executor.write(&commands::del("k"));
        assert!(result.major.is_blocked());
        assert_eq!(f.major.calls(), 6);
        assert!(result.minor.wait().is_applied());
    }

    #[test]
    fn test_minor_write_blocked() {
        let f = fixture();
        f.minor.set_failing(true);
        for _ in 0..6 {
            let result = f.executor.write(&commands::set("k", "v"));
            assert!(result.minor.wait().is_failed());
        }

        let result = f.executor.write(&commands::set("k", "v"));
        assert!(result.major.is_applied());
        assert!(result.minor.wait().is_blocked());
        assert_eq!(f.minor.calls(), 6);
    }

    #[test]
    fn test_panicking_trial_reopens_breaker() {
        let f = fixture();
        f.minor.set_failing(true);
        for _ in 0..7 {
            f.executor.write(&commands::set("k", "v")).minor.wait();
        }
        assert_eq!(
            f.executor.breaker().state(ResourceKey::MinorWrite),
            crate::breaker::BreakerState::Open
        );

        f.minor.set_failing(false);
        f.clock.advance(Duration::from_secs(5));

        let panics_on_minor = Operation::write("set k v", |r: &MemoryRegion| {
            if r.name() == "minor" {
                panic!("connection reset");
            }
            r.set(&Bytes::from("k"), &Bytes::from("v"))
        });
        let result = f.executor.write(&panics_on_minor);
        assert!(result.major.is_applied());
        match result.minor.wait() {
            WriteOutcome::Failed(e) => assert!(e.to_string().contains("connection reset")),
            other => panic!("expected a failed trial, got {:?}", other),
        }
        assert_eq!(
            f.executor.breaker().state(ResourceKey::MinorWrite),
            crate::breaker::BreakerState::Open
        );

        // The failed trial reopened the breaker; the next window recovers it
        f.clock.advance(Duration::from_secs(5));
        let result = f.executor.write(&commands::set("k", "v"));
        assert!(result.minor.wait().is_applied());
        assert_eq!(
            f.executor.breaker().state(ResourceKey::MinorWrite),
            crate::breaker::BreakerState::Closed
        );
    }

    #[test]
    fn test_panicking_major_read_fails_over() {
        let f = fixture();
        seed(&f.minor, "k", "minor");

        let panics_on_major = Operation::read("get k", |r: &MemoryRegion| {
            if r.name() == "major" {
                panic!("decoder bug");
            }
            r.get(&Bytes::from("k"))
        });
        assert_eq!(
            f.executor.read(&panics_on_major).unwrap(),
            Some(Bytes::from("minor"))
        );

        let snap = f
            .executor
            .breaker()
            .snapshot(ResourceKey::MajorRead, Strategy::ErrorRatio)
            .unwrap();
        assert_eq!(snap.errors, 1);
    }

    #[test]
    fn test_execute_dispatches_on_kind() {
        let f = fixture();
        match f.executor.execute(&commands::set("k", "v")).unwrap() {
            Executed::Write(result) => assert!(result.major.is_applied()),
            Executed::Read(_) => panic!("set is a write"),
        }
        match f.executor.execute(&commands::get("k")).unwrap() {
            Executed::Read(value) => assert_eq!(value, Some(Bytes::from("v"))),
            Executed::Write(_) => panic!("get is a read"),
        }
    }

    #[test]
    fn test_run_collapses_failed_write_to_default() {
        let f = fixture();
        f.major.set_failing(true);
        assert_eq!(f.executor.run(&commands::del("k")).unwrap(), 0);
    }

    #[test]
    fn test_unconfigured_breaker_never_blocks() {
        let major = Arc::new(MemoryRegion::new("major"));
        let minor = Arc::new(MemoryRegion::new("minor"));
        let executor = CommandExecutor::new(
            major.clone(),
            minor.clone(),
            Arc::new(CircuitBreaker::new()),
            1,
        )
        .unwrap();
        major.set_failing(true);

        for _ in 0..20 {
            let _ = executor.read(&commands::get("k"));
        }
        assert_eq!(major.calls(), 20);
    }
}
