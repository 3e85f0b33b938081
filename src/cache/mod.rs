//! Versioned request/response cache with network-first and cache-first
//! strategies.
//!
//! This module provides:
//! - Request identity and immutable response snapshots
//! - Named buckets in a pluggable storage backend (SQLite or in-memory)
//! - A cache layer applying one strategy per request over the current bucket
//! - Offline mode (serve a stored copy when the network is unavailable)

mod layer;
mod storage;
mod types;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use types::{
  BucketStatus, CacheResult, CacheSource, CachedEntry, EntrySummary, Request, RequestKey,
  ResponseSnapshot, Strategy,
};
