//! Command catalogue
//!
//! One constructor per command. Each returns an `Operation` carrying the
//! command's kind and a descriptor for logs, so the executor only ever deals
//! with a single generic path.

mod hash;
mod list;
mod set;
mod string;

pub use hash::{hdel, hget, hgetall, hincr_by, hlen, hset};
pub use list::{llen, lpop, lpush, lrange, rpop, rpush};
pub use set::{sadd, scard, sismember, smembers, srem};
pub use string::{
    decr, del, exists, expire, get, incr, incr_by, persist, set, set_ex, set_nx, ttl,
};

use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;

/// Render a key or value for a descriptor; binary data is shown as base64
pub(crate) fn describe(bytes: &Bytes) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => format!("b64:{}", general_purpose::STANDARD.encode(bytes)),
    }
}

/// Render several keys or values as `[a, b, c]`
pub(crate) fn describe_all(items: &[Bytes]) -> String {
    let parts: Vec<String> = items.iter().map(describe).collect();
    format!("[{}]", parts.join(", "))
}

/// Collect an argument list into owned bytes
pub(crate) fn to_bytes<I, B>(items: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_text_and_binary() {
        assert_eq!(describe(&Bytes::from("user:1")), "user:1");
        assert_eq!(describe(&Bytes::from_static(&[0xff, 0x00])), "b64:/wA=");
    }

    #[test]
    fn test_describe_all() {
        let items = to_bytes(["a", "b"]);
        assert_eq!(describe_all(&items), "[a, b]");
        assert_eq!(describe_all(&[]), "[]");
    }
}
