//! Entry structure for stored values

use super::value::Value;
use std::time::{Duration, Instant};

/// A stored value and its optional expiration
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,

    /// Optional expiration time (absolute)
    pub expire_at: Option<Instant>,
}

impl Entry {
    /// Create a new entry without expiration
    pub fn new(value: Value) -> Self {
        Entry {
            value,
            expire_at: None,
        }
    }

    /// Create a new entry with expiration, None if `ttl` is out of range
    pub fn with_expiration(value: Value, ttl: Duration) -> Option<Self> {
        let expire_at = Instant::now().checked_add(ttl)?;
        Some(Entry {
            value,
            expire_at: Some(expire_at),
        })
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.expire_at
            .map(|expire_at| Instant::now() >= expire_at)
            .unwrap_or(false)
    }

    /// Expire after `ttl`; a zero TTL expires immediately
    ///
    /// Returns false and leaves the entry untouched if `ttl` is out of range.
    pub fn set_expiration(&mut self, ttl: Duration) -> bool {
        match Instant::now().checked_add(ttl) {
            Some(expire_at) => {
                self.expire_at = Some(expire_at);
                true
            }
            None => false,
        }
    }

    /// Remove expiration, returns true if one was set
    pub fn remove_expiration(&mut self) -> bool {
        self.expire_at.take().is_some()
    }

    /// Remaining TTL in seconds, -1 when the entry never expires
    pub fn ttl_seconds(&self) -> i64 {
        match self.expire_at {
            Some(expire_at) => {
                let now = Instant::now();
                if expire_at > now {
                    expire_at.duration_since(now).as_secs() as i64
                } else {
                    -2 // Expired
                }
            }
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_expiration() {
        let mut entry = Entry::new(Value::string("v"));
        assert!(!entry.is_expired());
        assert_eq!(entry.ttl_seconds(), -1);
        assert!(!entry.remove_expiration());
    }

    #[test]
    fn test_entry_expiration() {
        let mut entry =
            Entry::with_expiration(Value::string("v"), Duration::from_secs(100)).unwrap();
        assert!(!entry.is_expired());
        assert!(entry.ttl_seconds() > 90);

        assert!(entry.set_expiration(Duration::ZERO));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_out_of_range_ttl() {
        let forever = Duration::from_secs(u64::MAX);
        assert!(Entry::with_expiration(Value::string("v"), forever).is_none());

        let mut entry = Entry::new(Value::string("v"));
        assert!(!entry.set_expiration(forever));
        assert_eq!(entry.ttl_seconds(), -1);
    }
}
