//! Generic unit of work executed against a region

use std::fmt;
use std::sync::Arc;

/// Whether an operation reads or mutates the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    Write,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Read => f.write_str("read operation"),
            OpKind::Write => f.write_str("write operation"),
        }
    }
}

type OpFn<R, T> = dyn Fn(&R) -> anyhow::Result<T> + Send + Sync;

/// A command against a region handle of type `R`, producing `T`
///
/// The same function runs against the major region and, for writes, against
/// the minor region on a replication worker, so it is kept behind an `Arc`.
pub struct Operation<R, T> {
    kind: OpKind,
    descriptor: String,
    func: Arc<OpFn<R, T>>,
}

impl<R, T> Operation<R, T> {
    pub fn new<F>(kind: OpKind, descriptor: impl Into<String>, func: F) -> Self
    where
        F: Fn(&R) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Operation {
            kind,
            descriptor: descriptor.into(),
            func: Arc::new(func),
        }
    }

    /// Read operation: served by major, falls back to minor
    pub fn read<F>(descriptor: impl Into<String>, func: F) -> Self
    where
        F: Fn(&R) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::new(OpKind::Read, descriptor, func)
    }

    /// Write operation: applied to major, mirrored to minor
    pub fn write<F>(descriptor: impl Into<String>, func: F) -> Self
    where
        F: Fn(&R) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::new(OpKind::Write, descriptor, func)
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Human-readable description used in logs
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Run the operation against one region
    pub fn execute_on(&self, region: &R) -> anyhow::Result<T> {
        (self.func)(region)
    }
}

// Clone without requiring R: Clone or T: Clone
impl<R, T> Clone for Operation<R, T> {
    fn clone(&self) -> Self {
        Operation {
            kind: self.kind,
            descriptor: self.descriptor.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<R, T> fmt::Debug for Operation<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
