//! Region handles
//!
//! A region is one datacenter's store, built and owned outside this crate.
//! The executor only ever invokes operations through it; it never touches
//! its configuration or connections.

mod entry;
mod memory;
mod value;

pub use entry::Entry;
pub use memory::MemoryRegion;
pub use value::Value;

use bytes::Bytes;
use std::collections::{HashMap, HashSet};

/// A handle to one region's store
pub trait Region: Send + Sync + 'static {
    /// Name used in logs and topology snapshots
    fn name(&self) -> &str;

    /// Addresses of the nodes currently serving this region
    fn members(&self) -> anyhow::Result<Vec<String>>;
}

/// The key-value command surface a region exposes
///
/// Every method may fail on network or protocol errors; type mismatches
/// (e.g. `hget` on a list) are errors too.
pub trait KeyValueStore: Region {
    // Strings and keys
    fn get(&self, key: &Bytes) -> anyhow::Result<Option<Bytes>>;
    fn set(&self, key: &Bytes, value: &Bytes) -> anyhow::Result<()>;
    fn set_ex(&self, key: &Bytes, value: &Bytes, seconds: u64) -> anyhow::Result<()>;
    /// Returns true if the key was set
    fn set_nx(&self, key: &Bytes, value: &Bytes) -> anyhow::Result<bool>;
    /// Returns the number of keys removed
    fn del(&self, key: &Bytes) -> anyhow::Result<u64>;
    fn exists(&self, key: &Bytes) -> anyhow::Result<bool>;
    fn expire(&self, key: &Bytes, seconds: u64) -> anyhow::Result<bool>;
    fn persist(&self, key: &Bytes) -> anyhow::Result<bool>;
    /// -2 if the key does not exist, -1 if it has no expiration
    fn ttl(&self, key: &Bytes) -> anyhow::Result<i64>;
    fn incr_by(&self, key: &Bytes, delta: i64) -> anyhow::Result<i64>;

    // Hashes
    fn hget(&self, key: &Bytes, field: &Bytes) -> anyhow::Result<Option<Bytes>>;
    /// Returns true if the field is new
    fn hset(&self, key: &Bytes, field: &Bytes, value: &Bytes) -> anyhow::Result<bool>;
    fn hdel(&self, key: &Bytes, fields: &[Bytes]) -> anyhow::Result<u64>;
    fn hgetall(&self, key: &Bytes) -> anyhow::Result<HashMap<Bytes, Bytes>>;
    fn hincr_by(&self, key: &Bytes, field: &Bytes, delta: i64) -> anyhow::Result<i64>;
    fn hlen(&self, key: &Bytes) -> anyhow::Result<u64>;

    // Lists
    /// Returns the list length after the push
    fn lpush(&self, key: &Bytes, values: &[Bytes]) -> anyhow::Result<u64>;
    fn rpush(&self, key: &Bytes, values: &[Bytes]) -> anyhow::Result<u64>;
    fn lpop(&self, key: &Bytes) -> anyhow::Result<Option<Bytes>>;
    fn rpop(&self, key: &Bytes) -> anyhow::Result<Option<Bytes>>;
    /// Inclusive range; negative indexes count from the tail
    fn lrange(&self, key: &Bytes, start: i64, stop: i64) -> anyhow::Result<Vec<Bytes>>;
    fn llen(&self, key: &Bytes) -> anyhow::Result<u64>;

    // Sets
    /// Returns the number of members added
    fn sadd(&self, key: &Bytes, members: &[Bytes]) -> anyhow::Result<u64>;
    fn srem(&self, key: &Bytes, members: &[Bytes]) -> anyhow::Result<u64>;
    fn smembers(&self, key: &Bytes) -> anyhow::Result<HashSet<Bytes>>;
    fn sismember(&self, key: &Bytes, member: &Bytes) -> anyhow::Result<bool>;
    fn scard(&self, key: &Bytes) -> anyhow::Result<u64>;
}
