//! List commands

use super::{describe, describe_all, to_bytes};
use crate::operation::Operation;
use crate::region::KeyValueStore;
use bytes::Bytes;

/// LPUSH key value [value ...]
pub fn lpush<R, I, B>(key: impl Into<Bytes>, values: I) -> Operation<R, u64>
where
    R: KeyValueStore,
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let (key, values) = (key.into(), to_bytes(values));
    Operation::write(
        format!("lpush key {} values {}", describe(&key), describe_all(&values)),
        move |r: &R| r.lpush(&key, &values),
    )
}

/// RPUSH key value [value ...]
pub fn rpush<R, I, B>(key: impl Into<Bytes>, values: I) -> Operation<R, u64>
where
    R: KeyValueStore,
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let (key, values) = (key.into(), to_bytes(values));
    Operation::write(
        format!("rpush key {} values {}", describe(&key), describe_all(&values)),
        move |r: &R| r.rpush(&key, &values),
    )
}

/// LPOP key
pub fn lpop<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, Option<Bytes>> {
    let key = key.into();
    Operation::write(format!("lpop key {}", describe(&key)), move |r: &R| r.lpop(&key))
}

/// RPOP key
pub fn rpop<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, Option<Bytes>> {
    let key = key.into();
    Operation::write(format!("rpop key {}", describe(&key)), move |r: &R| r.rpop(&key))
}

/// LRANGE key start stop
pub fn lrange<R: KeyValueStore>(
    key: impl Into<Bytes>,
    start: i64,
    stop: i64,
) -> Operation<R, Vec<Bytes>> {
    let key = key.into();
    Operation::read(
        format!("lrange key {} start {} end {}", describe(&key), start, stop),
        move |r: &R| r.lrange(&key, start, stop),
    )
}

/// LLEN key
pub fn llen<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, u64> {
    let key = key.into();
    Operation::read(format!("llen key {}", describe(&key)), move |r: &R| r.llen(&key))
}
