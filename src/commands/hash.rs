//! Hash commands

use super::{describe, describe_all, to_bytes};
use crate::operation::Operation;
use crate::region::KeyValueStore;
use bytes::Bytes;
use std::collections::HashMap;

/// HGET key field
pub fn hget<R: KeyValueStore>(
    key: impl Into<Bytes>,
    field: impl Into<Bytes>,
) -> Operation<R, Option<Bytes>> {
    let (key, field) = (key.into(), field.into());
    Operation::read(
        format!("hget key {} field {}", describe(&key), describe(&field)),
        move |r: &R| r.hget(&key, &field),
    )
}

/// HSET key field value
pub fn hset<R: KeyValueStore>(
    key: impl Into<Bytes>,
    field: impl Into<Bytes>,
    value: impl Into<Bytes>,
) -> Operation<R, bool> {
    let (key, field, value) = (key.into(), field.into(), value.into());
    Operation::write(
        format!(
            "hset key {} field {} value {}",
            describe(&key),
            describe(&field),
            describe(&value)
        ),
        move |r: &R| r.hset(&key, &field, &value),
    )
}

/// HDEL key field [field ...]
pub fn hdel<R, I, B>(key: impl Into<Bytes>, fields: I) -> Operation<R, u64>
where
    R: KeyValueStore,
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let (key, fields) = (key.into(), to_bytes(fields));
    Operation::write(
        format!("hdel key {} fields {}", describe(&key), describe_all(&fields)),
        move |r: &R| r.hdel(&key, &fields),
    )
}

/// HGETALL key
pub fn hgetall<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, HashMap<Bytes, Bytes>> {
    let key = key.into();
    Operation::read(format!("hgetAll key {}", describe(&key)), move |r: &R| r.hgetall(&key))
}

/// HINCRBY key field delta
pub fn hincr_by<R: KeyValueStore>(
    key: impl Into<Bytes>,
    field: impl Into<Bytes>,
    delta: i64,
) -> Operation<R, i64> {
    let (key, field) = (key.into(), field.into());
    Operation::write(
        format!(
            "hincrBy key {} field {} value {}",
            describe(&key),
            describe(&field),
            delta
        ),
        move |r: &R| r.hincr_by(&key, &field, delta),
    )
}

/// HLEN key
pub fn hlen<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, u64> {
    let key = key.into();
    Operation::read(format!("hlen key {}", describe(&key)), move |r: &R| r.hlen(&key))
}
