//! crossroom - Cross-region command execution for a key-value cache tier
//!
//! Two regions of the same store type are used together:
//! - The major region serves reads and takes writes synchronously
//! - The minor region mirrors every write asynchronously and serves reads
//!   when the major region is failing or degraded
//! - A circuit breaker per resource (major/minor, read/write) stops calling
//!   a region that is erroring or slow until it recovers

pub mod breaker;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod operation;
pub mod outcome;
pub mod region;
pub mod replicator;
pub mod topology;

/// Re-export commonly used types
pub use breaker::{BreakerState, CircuitBreaker, DegradeRule, ResourceKey, Strategy};
pub use client::{CrossRoomClient, CrossRoomClientBuilder};
pub use config::CrossRoomConfig;
pub use error::{CrossRoomError, RuleError};
pub use executor::{CommandExecutor, Executed, WriteResult};
pub use operation::{OpKind, Operation};
pub use outcome::WriteOutcome;
pub use region::{KeyValueStore, MemoryRegion, Region};
pub use replicator::{AsyncReplicator, PendingReplication};
pub use topology::CrossRoomTopology;
