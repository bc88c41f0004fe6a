//! Thread synchronization layer
//!
//! Everything between the LangGraph API client and the CLI: batched state
//! fetches behind a circuit breaker, single-flight deduplication, retries,
//! predictive prefetching and the [`ThreadSync`] facade that ties them together
//! for one agent/deployment scope.

pub mod batch;
pub mod breaker;
pub mod dedup;
pub mod facade;
pub mod interrupts;
pub mod prefetch;
pub mod retry;
pub mod timing;

use std::time::Duration;

pub use breaker::CircuitBreakerConfig;
pub use facade::ThreadSync;
pub use prefetch::PrefetchConfig;
pub use retry::RetryPolicy;

use crate::cache::{CacheTtl, STATE_CACHE_MAX_ENTRIES};

/// Tunables for one [`ThreadSync`] facade.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Lifetime of a cached thread list
    pub list_ttl: Duration,
    /// Age after which a cached list is served but refreshed in the background
    pub list_stale_after: Duration,
    /// Lifetime of a cached thread state
    pub state_ttl: Duration,
    pub state_cache_max_entries: usize,
    /// Maximum state calls in flight, batch waves and prefetches together
    pub concurrency: usize,
    pub state_policy: RetryPolicy,
    pub search_policy: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
    pub prefetch: PrefetchConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            list_ttl: CacheTtl::THREAD_LIST,
            list_stale_after: CacheTtl::THREAD_LIST_STALE,
            state_ttl: CacheTtl::THREAD_STATE,
            state_cache_max_entries: STATE_CACHE_MAX_ENTRIES,
            concurrency: 5,
            state_policy: RetryPolicy::new(
                Duration::from_secs(15),
                2,
                Duration::from_millis(1000),
            ),
            search_policy: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
            prefetch: PrefetchConfig::default(),
        }
    }
}
