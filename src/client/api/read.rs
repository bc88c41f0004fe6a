//! Read API trait for thread lookups

use async_trait::async_trait;

use crate::client::models::{Scope, Thread, ThreadFilter, ThreadState};
use crate::error::ApiResult;

/// Thread read operations against the orchestration service
#[async_trait]
pub trait ThreadReadApi: Send + Sync {
    /// Search threads belonging to the scope's agent.
    ///
    /// The filter's status (if any) and page window are passed through as-is;
    /// the caller validates the limit.
    async fn search_threads(&self, scope: &Scope, filter: &ThreadFilter)
    -> ApiResult<Vec<Thread>>;

    /// Get a single thread summary
    async fn get_thread(&self, thread_id: &str) -> ApiResult<Thread>;

    /// Get the full state snapshot of a thread.
    ///
    /// This is the expensive call; the sync layer caches and rate-bounds it.
    async fn get_thread_state(&self, thread_id: &str) -> ApiResult<ThreadState>;
}
