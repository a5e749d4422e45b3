//! In-memory region
//!
//! A single-process stand-in for one region's store, used by the demo binary
//! and the test suite. Faults can be injected to simulate an outage or a slow
//! region, and every command invocation is counted.

use super::entry::Entry;
use super::value::Value;
use super::{KeyValueStore, Region};
use anyhow::{anyhow, bail};
use bytes::Bytes;
use siphasher::sip::SipHasher13;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Type alias for our hash map with SipHasher
type StoreMap = HashMap<Bytes, Entry, BuildHasherDefault<SipHasher13>>;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// In-memory key-value region
#[derive(Debug)]
pub struct MemoryRegion {
    name: String,
    members: Vec<String>,
    store: Mutex<StoreMap>,
    failing: AtomicBool,
    latency_ms: AtomicU64,
    calls: AtomicU64,
}

impl MemoryRegion {
    /// Create an empty region with no listed members
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_members(name, Vec::new())
    }

    /// Create an empty region reporting the given member addresses
    pub fn with_members(name: impl Into<String>, members: Vec<String>) -> Self {
        MemoryRegion {
            name: name.into(),
            members,
            store: Mutex::new(StoreMap::default()),
            failing: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    /// Make every command fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every command by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of commands invoked so far, including failed ones
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inspect a value without counting a call or triggering faults
    pub fn peek(&self, key: impl Into<Bytes>) -> Option<Value> {
        let key = key.into();
        let mut store = self.lock();
        live(&mut store, &key).map(|entry| entry.value.clone())
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.lock().values().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, StoreMap> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, apply injected faults, then hand out the store
    fn enter(&self, command: &str) -> anyhow::Result<MutexGuard<'_, StoreMap>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }

        if self.failing.load(Ordering::SeqCst) {
            bail!("region {} unavailable ({})", self.name, command);
        }

        debug!("{} <- {}", self.name, command);
        Ok(self.lock())
    }
}

/// The entry for `key`, dropping it first if it has expired
fn live<'a>(store: &'a mut StoreMap, key: &Bytes) -> Option<&'a mut Entry> {
    if store.get(key).is_some_and(Entry::is_expired) {
        store.remove(key);
        return None;
    }
    store.get_mut(key)
}

/// The entry for `key`, created from `empty` if missing or expired
fn live_or_insert<'a>(store: &'a mut StoreMap, key: &Bytes, empty: fn() -> Value) -> &'a mut Entry {
    if store.get(key).is_some_and(Entry::is_expired) {
        store.remove(key);
    }
    store
        .entry(key.clone())
        .or_insert_with(|| Entry::new(empty()))
}

/// Drop containers that became empty, as the real store does
fn drop_if_empty(store: &mut StoreMap, key: &Bytes) {
    if store
        .get(key)
        .is_some_and(|entry| entry.value.is_empty_container())
    {
        store.remove(key);
    }
}

fn parse_integer(raw: &Bytes) -> anyhow::Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| anyhow!("ERR value is not an integer or out of range"))
}

fn add_checked(current: i64, delta: i64) -> anyhow::Result<i64> {
    current
        .checked_add(delta)
        .ok_or_else(|| anyhow!("ERR increment or decrement would overflow"))
}

fn zero() -> Value {
    Value::string("0")
}

impl Region for MemoryRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn members(&self) -> anyhow::Result<Vec<String>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("region {} unavailable (cluster nodes)", self.name);
        }
        Ok(self.members.clone())
    }
}

impl KeyValueStore for MemoryRegion {
    fn get(&self, key: &Bytes) -> anyhow::Result<Option<Bytes>> {
        let mut store = self.enter("get")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::String(bytes)) => Ok(Some(bytes.clone())),
            Some(_) => bail!(WRONG_TYPE),
        }
    }

    fn set(&self, key: &Bytes, value: &Bytes) -> anyhow::Result<()> {
        let mut store = self.enter("set")?;
        store.insert(key.clone(), Entry::new(Value::String(value.clone())));
        Ok(())
    }

    fn set_ex(&self, key: &Bytes, value: &Bytes, seconds: u64) -> anyhow::Result<()> {
        let mut store = self.enter("setex")?;
        let Some(entry) =
            Entry::with_expiration(Value::String(value.clone()), Duration::from_secs(seconds))
        else {
            bail!("ERR invalid expire time in 'setex' command");
        };
        store.insert(key.clone(), entry);
        Ok(())
    }

    fn set_nx(&self, key: &Bytes, value: &Bytes) -> anyhow::Result<bool> {
        let mut store = self.enter("setnx")?;
        if live(&mut store, key).is_some() {
            return Ok(false);
        }
        store.insert(key.clone(), Entry::new(Value::String(value.clone())));
        Ok(true)
    }

    fn del(&self, key: &Bytes) -> anyhow::Result<u64> {
        let mut store = self.enter("del")?;
        if live(&mut store, key).is_none() {
            return Ok(0);
        }
        store.remove(key);
        Ok(1)
    }

    fn exists(&self, key: &Bytes) -> anyhow::Result<bool> {
        let mut store = self.enter("exists")?;
        Ok(live(&mut store, key).is_some())
    }

    fn expire(&self, key: &Bytes, seconds: u64) -> anyhow::Result<bool> {
        let mut store = self.enter("expire")?;
        match live(&mut store, key) {
            Some(entry) => {
                if !entry.set_expiration(Duration::from_secs(seconds)) {
                    bail!("ERR invalid expire time in 'expire' command");
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn persist(&self, key: &Bytes) -> anyhow::Result<bool> {
        let mut store = self.enter("persist")?;
        Ok(live(&mut store, key).is_some_and(|entry| entry.remove_expiration()))
    }

    fn ttl(&self, key: &Bytes) -> anyhow::Result<i64> {
        let mut store = self.enter("ttl")?;
        Ok(live(&mut store, key).map_or(-2, |entry| entry.ttl_seconds()))
    }

    fn incr_by(&self, key: &Bytes, delta: i64) -> anyhow::Result<i64> {
        let mut store = self.enter("incrby")?;
        let entry = live_or_insert(&mut store, key, zero);
        let Value::String(raw) = &mut entry.value else {
            bail!(WRONG_TYPE);
        };
        let next = add_checked(parse_integer(raw)?, delta)?;
        *raw = Bytes::from(next.to_string());
        Ok(next)
    }

    fn hget(&self, key: &Bytes, field: &Bytes) -> anyhow::Result<Option<Bytes>> {
        let mut store = self.enter("hget")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => bail!(WRONG_TYPE),
        }
    }

    fn hset(&self, key: &Bytes, field: &Bytes, value: &Bytes) -> anyhow::Result<bool> {
        let mut store = self.enter("hset")?;
        let entry = live_or_insert(&mut store, key, Value::empty_hash);
        let Value::Hash(hash) = &mut entry.value else {
            bail!(WRONG_TYPE);
        };
        Ok(hash.insert(field.clone(), value.clone()).is_none())
    }

    fn hdel(&self, key: &Bytes, fields: &[Bytes]) -> anyhow::Result<u64> {
        let mut store = self.enter("hdel")?;
        let removed = match live(&mut store, key).map(|entry| &mut entry.value) {
            None => return Ok(0),
            Some(Value::Hash(hash)) => fields.iter().filter(|f| hash.remove(*f).is_some()).count(),
            Some(_) => bail!(WRONG_TYPE),
        };
        drop_if_empty(&mut store, key);
        Ok(removed as u64)
    }

    fn hgetall(&self, key: &Bytes) -> anyhow::Result<HashMap<Bytes, Bytes>> {
        let mut store = self.enter("hgetall")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => bail!(WRONG_TYPE),
        }
    }

    fn hincr_by(&self, key: &Bytes, field: &Bytes, delta: i64) -> anyhow::Result<i64> {
        let mut store = self.enter("hincrby")?;
        let entry = live_or_insert(&mut store, key, Value::empty_hash);
        let Value::Hash(hash) = &mut entry.value else {
            bail!(WRONG_TYPE);
        };
        let current = match hash.get(field) {
            Some(raw) => parse_integer(raw)?,
            None => 0,
        };
        let next = add_checked(current, delta)?;
        hash.insert(field.clone(), Bytes::from(next.to_string()));
        Ok(next)
    }

    fn hlen(&self, key: &Bytes) -> anyhow::Result<u64> {
        let mut store = self.enter("hlen")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(0),
            Some(Value::Hash(hash)) => Ok(hash.len() as u64),
            Some(_) => bail!(WRONG_TYPE),
        }
    }

    fn lpush(&self, key: &Bytes, values: &[Bytes]) -> anyhow::Result<u64> {
        let mut store = self.enter("lpush")?;
        let entry = live_or_insert(&mut store, key, Value::empty_list);
        let Value::List(list) = &mut entry.value else {
            bail!(WRONG_TYPE);
        };
        values.iter().for_each(|v| list.push_front(v.clone()));
        Ok(list.len() as u64)
    }

    fn rpush(&self, key: &Bytes, values: &[Bytes]) -> anyhow::Result<u64> {
        let mut store = self.enter("rpush")?;
        let entry = live_or_insert(&mut store, key, Value::empty_list);
        let Value::List(list) = &mut entry.value else {
            bail!(WRONG_TYPE);
        };
        values.iter().for_each(|v| list.push_back(v.clone()));
        Ok(list.len() as u64)
    }

    fn lpop(&self, key: &Bytes) -> anyhow::Result<Option<Bytes>> {
        let mut store = self.enter("lpop")?;
        let popped = match live(&mut store, key).map(|entry| &mut entry.value) {
            None => return Ok(None),
            Some(Value::List(list)) => list.pop_front(),
            Some(_) => bail!(WRONG_TYPE),
        };
        drop_if_empty(&mut store, key);
        Ok(popped)
    }

    fn rpop(&self, key: &Bytes) -> anyhow::Result<Option<Bytes>> {
        let mut store = self.enter("rpop")?;
        let popped = match live(&mut store, key).map(|entry| &mut entry.value) {
            None => return Ok(None),
            Some(Value::List(list)) => list.pop_back(),
            Some(_) => bail!(WRONG_TYPE),
        };
        drop_if_empty(&mut store, key);
        Ok(popped)
    }

    fn lrange(&self, key: &Bytes, start: i64, stop: i64) -> anyhow::Result<Vec<Bytes>> {
        let mut store = self.enter("lrange")?;
        let list = match live(&mut store, key).map(|entry| &entry.value) {
            None => return Ok(Vec::new()),
            Some(Value::List(list)) => list,
            Some(_) => bail!(WRONG_TYPE),
        };

        let len = list.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Ok(Vec::new());
        }

        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    fn llen(&self, key: &Bytes) -> anyhow::Result<u64> {
        let mut store = self.enter("llen")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as u64),
            Some(_) => bail!(WRONG_TYPE),
        }
    }

    fn sadd(&self, key: &Bytes, members: &[Bytes]) -> anyhow::Result<u64> {
        let mut store = self.enter("sadd")?;
        let entry = live_or_insert(&mut store, key, Value::empty_set);
        let Value::Set(set) = &mut entry.value else {
            bail!(WRONG_TYPE);
        };
        let added = members.iter().filter(|m| set.insert((*m).clone())).count();
        Ok(added as u64)
    }

    fn srem(&self, key: &Bytes, members: &[Bytes]) -> anyhow::Result<u64> {
        let mut store = self.enter("srem")?;
        let removed = match live(&mut store, key).map(|entry| &mut entry.value) {
            None => return Ok(0),
            Some(Value::Set(set)) => members.iter().filter(|m| set.remove(*m)).count(),
            Some(_) => bail!(WRONG_TYPE),
        };
        drop_if_empty(&mut store, key);
        Ok(removed as u64)
    }

    fn smembers(&self, key: &Bytes) -> anyhow::Result<HashSet<Bytes>> {
        let mut store = self.enter("smembers")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(HashSet::new()),
            Some(Value::Set(set)) => Ok(set.clone()),
            Some(_) => bail!(WRONG_TYPE),
        }
    }

    fn sismember(&self, key: &Bytes, member: &Bytes) -> anyhow::Result<bool> {
        let mut store = self.enter("sismember")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(false),
            Some(Value::Set(set)) => Ok(set.contains(member)),
            Some(_) => bail!(WRONG_TYPE),
        }
    }

    fn scard(&self, key: &Bytes) -> anyhow::Result<u64> {
        let mut store = self.enter("scard")?;
        match live(&mut store, key).map(|entry| &entry.value) {
            None => Ok(0),
            Some(Value::Set(set)) => Ok(set.len() as u64),
            Some(_) => bail!(WRONG_TYPE),
        }
    }
}
