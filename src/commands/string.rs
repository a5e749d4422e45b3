//! String and key commands

use super::describe;
use crate::operation::Operation;
use crate::region::KeyValueStore;
use bytes::Bytes;

/// GET key
pub fn get<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, Option<Bytes>> {
    let key = key.into();
    Operation::read(format!("get key {}", describe(&key)), move |r: &R| r.get(&key))
}

/// SET key value
pub fn set<R: KeyValueStore>(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Operation<R, ()> {
    let (key, value) = (key.into(), value.into());
    Operation::write(
        format!("set key {} value {}", describe(&key), describe(&value)),
        move |r: &R| r.set(&key, &value),
    )
}

/// SETEX key seconds value
pub fn set_ex<R: KeyValueStore>(
    key: impl Into<Bytes>,
    seconds: u64,
    value: impl Into<Bytes>,
) -> Operation<R, ()> {
    let (key, value) = (key.into(), value.into());
    Operation::write(
        format!("setex key {} seconds {} value {}", describe(&key), seconds, describe(&value)),
        move |r: &R| r.set_ex(&key, &value, seconds),
    )
}

/// SETNX key value
pub fn set_nx<R: KeyValueStore>(
    key: impl Into<Bytes>,
    value: impl Into<Bytes>,
) -> Operation<R, bool> {
    let (key, value) = (key.into(), value.into());
    Operation::write(
        format!("setnx key {} value {}", describe(&key), describe(&value)),
        move |r: &R| r.set_nx(&key, &value),
    )
}

/// DEL key
pub fn del<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, u64> {
    let key = key.into();
    Operation::write(format!("del key {}", describe(&key)), move |r: &R| r.del(&key))
}

/// EXISTS key
pub fn exists<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, bool> {
    let key = key.into();
    Operation::read(format!("exists key {}", describe(&key)), move |r: &R| r.exists(&key))
}

/// EXPIRE key seconds
pub fn expire<R: KeyValueStore>(key: impl Into<Bytes>, seconds: u64) -> Operation<R, bool> {
    let key = key.into();
    Operation::write(
        format!("expire key {} seconds {}", describe(&key), seconds),
        move |r: &R| r.expire(&key, seconds),
    )
}

/// PERSIST key
pub fn persist<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, bool> {
    let key = key.into();
    Operation::write(format!("persist key {}", describe(&key)), move |r: &R| r.persist(&key))
}

/// TTL key
pub fn ttl<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, i64> {
    let key = key.into();
    Operation::read(format!("ttl key {}", describe(&key)), move |r: &R| r.ttl(&key))
}

/// INCRBY key delta
pub fn incr_by<R: KeyValueStore>(key: impl Into<Bytes>, delta: i64) -> Operation<R, i64> {
    let key = key.into();
    Operation::write(
        format!("incrBy key {} increment {}", describe(&key), delta),
        move |r: &R| r.incr_by(&key, delta),
    )
}

/// INCR key
pub fn incr<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, i64> {
    let key = key.into();
    Operation::write(format!("incr key {}", describe(&key)), move |r: &R| r.incr_by(&key, 1))
}

/// DECR key
pub fn decr<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, i64> {
    let key = key.into();
    Operation::write(format!("decr key {}", describe(&key)), move |r: &R| r.incr_by(&key, -1))
}
