//! Local caching for upstream responses
//!
//! In-memory TTL caches with optional SQLite backing and file blob storage for
//! large payloads. Durable backing is best-effort: failures are logged and the
//! cache keeps working from memory.

pub mod key;
pub mod storage;
pub mod ttl;

use std::time::Duration;

/// Default cache lifetimes per data type
pub struct CacheTtl;

impl CacheTtl {
    /// Enriched thread lists
    pub const THREAD_LIST: Duration = Duration::from_secs(5 * 60); // 5 min
    /// Age after which a served list triggers a background refresh
    pub const THREAD_LIST_STALE: Duration = Duration::from_secs(60); // 1 min
    /// Per-thread state snapshots
    pub const THREAD_STATE: Duration = Duration::from_secs(30); // 30 sec
}

/// Default bound on the per-thread state cache
pub const STATE_CACHE_MAX_ENTRIES: usize = 500;

pub use key::{CacheKey, Endpoint, KeyFilter};
pub use storage::{CacheBackend, SqliteBackend};
pub use ttl::TtlCache;
