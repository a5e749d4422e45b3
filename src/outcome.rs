//! Write results
//!
//! A write never raises. What happened on each region is reported here so a
//! legitimately empty result (a `del` that removed nothing) can be told apart
//! from a skipped or failed write.

/// What happened to a write on one region
#[derive(Debug)]
pub enum WriteOutcome<T> {
    /// The region executed the write
    Applied(T),
    /// The breaker for this resource was open; nothing was executed
    Blocked,
    /// The region call failed; the failure was logged and not retried
    Failed(anyhow::Error),
}

impl<T> WriteOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, WriteOutcome::Blocked)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            WriteOutcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            WriteOutcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    /// Collapse to the value, or `T::default()` if the write did not apply
    pub fn into_value_or_default(self) -> T
    where
        T: Default,
    {
        self.into_value().unwrap_or_default()
    }
}
