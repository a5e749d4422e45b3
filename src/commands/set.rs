//! Set commands

use super::{describe, describe_all, to_bytes};
use crate::operation::Operation;
use crate::region::KeyValueStore;
use bytes::Bytes;
use std::collections::HashSet;

/// SADD key member [member ...]
pub fn sadd<R, I, B>(key: impl Into<Bytes>, members: I) -> Operation<R, u64>
where
    R: KeyValueStore,
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let (key, members) = (key.into(), to_bytes(members));
    Operation::write(
        format!("sadd key {} members {}", describe(&key), describe_all(&members)),
        move |r: &R| r.sadd(&key, &members),
    )
}

/// SREM key member [member ...]
pub fn srem<R, I, B>(key: impl Into<Bytes>, members: I) -> Operation<R, u64>
where
    R: KeyValueStore,
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let (key, members) = (key.into(), to_bytes(members));
    Operation::write(
        format!("srem key {} members {}", describe(&key), describe_all(&members)),
        move |r: &R| r.srem(&key, &members),
    )
}

/// SMEMBERS key
pub fn smembers<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, HashSet<Bytes>> {
    let key = key.into();
    Operation::read(format!("smembers key {}", describe(&key)), move |r: &R| r.smembers(&key))
}

/// SISMEMBER key member
pub fn sismember<R: KeyValueStore>(
    key: impl Into<Bytes>,
    member: impl Into<Bytes>,
) -> Operation<R, bool> {
    let (key, member) = (key.into(), member.into());
    Operation::read(
        format!("sismember key {} member {}", describe(&key), describe(&member)),
        move |r: &R| r.sismember(&key, &member),
    )
}

/// SCARD key
pub fn scard<R: KeyValueStore>(key: impl Into<Bytes>) -> Operation<R, u64> {
    let key = key.into();
    Operation::read(format!("scard key {}", describe(&key)), move |r: &R| r.scard(&key))
}
