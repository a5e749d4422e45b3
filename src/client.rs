//! Typed cross-room client
//!
//! Wraps a `CommandExecutor` with one method per catalogue command. Reads
//! return `Result`; writes return a `WriteResult` and never fail.

use crate::breaker::{CircuitBreaker, Clock, SystemClock};
use crate::commands;
use crate::config::CrossRoomConfig;
use crate::error::CrossRoomError;
use crate::executor::{CommandExecutor, Executed, WriteResult};
use crate::operation::Operation;
use crate::region::KeyValueStore;
use crate::topology::CrossRoomTopology;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

type ReadResult<T> = Result<T, CrossRoomError>;

/// Cross-room client over two regions of the same store type
pub struct CrossRoomClient<R: KeyValueStore> {
    executor: CommandExecutor<R>,
}

impl<R: KeyValueStore> CrossRoomClient<R> {
    pub fn builder(major: Arc<R>, minor: Arc<R>) -> CrossRoomClientBuilder<R> {
        CrossRoomClientBuilder::new(major, minor)
    }

    /// Execute a custom operation
    pub fn execute<T>(&self, op: &Operation<R, T>) -> Result<Executed<T>, CrossRoomError>
    where
        T: Send + 'static,
    {
        self.executor.execute(op)
    }

    /// Execute a custom operation, keeping only the value
    pub fn run<T>(&self, op: &Operation<R, T>) -> Result<T, CrossRoomError>
    where
        T: Default + Send + 'static,
    {
        self.executor.run(op)
    }

    pub fn topology(&self) -> CrossRoomTopology {
        self.executor.topology()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.executor.breaker()
    }

    pub fn major(&self) -> &Arc<R> {
        self.executor.major()
    }

    pub fn minor(&self) -> &Arc<R> {
        self.executor.minor()
    }

    pub fn executor(&self) -> &CommandExecutor<R> {
        &self.executor
    }

    /// Stop the replication pool, letting in-flight mirrors finish
    pub fn shutdown(self) {
        self.executor.shutdown();
    }

    // ===== Strings and keys =====

    pub fn get(&self, key: impl Into<Bytes>) -> ReadResult<Option<Bytes>> {
        self.executor.read(&commands::get(key))
    }

    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> WriteResult<()> {
        self.executor.write(&commands::set(key, value))
    }

    pub fn set_ex(
        &self,
        key: impl Into<Bytes>,
        seconds: u64,
        value: impl Into<Bytes>,
    ) -> WriteResult<()> {
        self.executor.write(&commands::set_ex(key, seconds, value))
    }

    pub fn set_nx(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> WriteResult<bool> {
        self.executor.write(&commands::set_nx(key, value))
    }

    pub fn del(&self, key: impl Into<Bytes>) -> WriteResult<u64> {
        self.executor.write(&commands::del(key))
    }

    pub fn exists(&self, key: impl Into<Bytes>) -> ReadResult<bool> {
        self.executor.read(&commands::exists(key))
    }

    pub fn expire(&self, key: impl Into<Bytes>, seconds: u64) -> WriteResult<bool> {
        self.executor.write(&commands::expire(key, seconds))
    }

    pub fn persist(&self, key: impl Into<Bytes>) -> WriteResult<bool> {
        self.executor.write(&commands::persist(key))
    }

    pub fn ttl(&self, key: impl Into<Bytes>) -> ReadResult<i64> {
        self.executor.read(&commands::ttl(key))
    }

    pub fn incr(&self, key: impl Into<Bytes>) -> WriteResult<i64> {
        self.executor.write(&commands::incr(key))
    }

    pub fn incr_by(&self, key: impl Into<Bytes>, delta: i64) -> WriteResult<i64> {
        self.executor.write(&commands::incr_by(key, delta))
    }

    pub fn decr(&self, key: impl Into<Bytes>) -> WriteResult<i64> {
        self.executor.write(&commands::decr(key))
    }

    // ===== Hashes =====

    pub fn hget(
        &self,
        key: impl Into<Bytes>,
        field: impl Into<Bytes>,
    ) -> ReadResult<Option<Bytes>> {
        self.executor.read(&commands::hget(key, field))
    }

    pub fn hset(
        &self,
        key: impl Into<Bytes>,
        field: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> WriteResult<bool> {
        self.executor.write(&commands::hset(key, field, value))
    }

    pub fn hdel<I, B>(&self, key: impl Into<Bytes>, fields: I) -> WriteResult<u64>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.executor.write(&commands::hdel(key, fields))
    }

    pub fn hgetall(&self, key: impl Into<Bytes>) -> ReadResult<HashMap<Bytes, Bytes>> {
        self.executor.read(&commands::hgetall(key))
    }

    pub fn hincr_by(
        &self,
        key: impl Into<Bytes>,
        field: impl Into<Bytes>,
        delta: i64,
    ) -> WriteResult<i64> {
        self.executor.write(&commands::hincr_by(key, field, delta))
    }

    pub fn hlen(&self, key: impl Into<Bytes>) -> ReadResult<u64> {
        self.executor.read(&commands::hlen(key))
    }

    // ===== Lists =====

    pub fn lpush<I, B>(&self, key: impl Into<Bytes>, values: I) -> WriteResult<u64>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.executor.write(&commands::lpush(key, values))
    }

    pub fn rpush<I, B>(&self, key: impl Into<Bytes>, values: I) -> WriteResult<u64>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.executor.write(&commands::rpush(key, values))
    }

    pub fn lpop(&self, key: impl Into<Bytes>) -> WriteResult<Option<Bytes>> {
        self.executor.write(&commands::lpop(key))
    }

    pub fn rpop(&self, key: impl Into<Bytes>) -> WriteResult<Option<Bytes>> {
        self.executor.write(&commands::rpop(key))
    }

    pub fn lrange(&self, key: impl Into<Bytes>, start: i64, stop: i64) -> ReadResult<Vec<Bytes>> {
        self.executor.read(&commands::lrange(key, start, stop))
    }

    pub fn llen(&self, key: impl Into<Bytes>) -> ReadResult<u64> {
        self.executor.read(&commands::llen(key))
    }

    // ===== Sets =====

    pub fn sadd<I, B>(&self, key: impl Into<Bytes>, members: I) -> WriteResult<u64>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.executor.write(&commands::sadd(key, members))
    }

    pub fn srem<I, B>(&self, key: impl Into<Bytes>, members: I) -> WriteResult<u64>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.executor.write(&commands::srem(key, members))
    }

    pub fn smembers(&self, key: impl Into<Bytes>) -> ReadResult<HashSet<Bytes>> {
        self.executor.read(&commands::smembers(key))
    }

    pub fn sismember(&self, key: impl Into<Bytes>, member: impl Into<Bytes>) -> ReadResult<bool> {
        self.executor.read(&commands::sismember(key, member))
    }

    pub fn scard(&self, key: impl Into<Bytes>) -> ReadResult<u64> {
        self.executor.read(&commands::scard(key))
    }
}

/// Builder for `CrossRoomClient`
pub struct CrossRoomClientBuilder<R: KeyValueStore> {
    major: Arc<R>,
    minor: Arc<R>,
    config: CrossRoomConfig,
    clock: Option<Arc<dyn Clock>>,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl<R: KeyValueStore> CrossRoomClientBuilder<R> {
    pub fn new(major: Arc<R>, minor: Arc<R>) -> Self {
        CrossRoomClientBuilder {
            major,
            minor,
            config: CrossRoomConfig::default(),
            clock: None,
            breaker: None,
        }
    }

    pub fn config(mut self, config: CrossRoomConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock for the breaker built from the configured rules
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an existing breaker; the configured rules are then not installed
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn build(self) -> anyhow::Result<CrossRoomClient<R>> {
        self.config.validate()?;

        let breaker = match self.breaker {
            Some(breaker) => breaker,
            None => {
                let clock = self
                    .clock
                    .unwrap_or_else(|| Arc::new(SystemClock::new()));
                Arc::new(CircuitBreaker::with_rules(&self.config.rules, clock)?)
            }
        };

        let executor = CommandExecutor::new(
            self.major,
            self.minor,
            breaker,
            self.config.write_pool_size,
        )?;

        info!(
            "Cross-room client ready: major={} minor={} pool={}",
            executor.major().name(),
            executor.minor().name(),
            executor.pool_size()
        );

        Ok(CrossRoomClient { executor })
    }
}
