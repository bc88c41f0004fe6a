//! Write API trait for thread mutations

use async_trait::async_trait;

use crate::client::models::{Run, RunCommand, StatePatch};
use crate::error::ApiResult;

/// Mutating operations against the orchestration service
#[async_trait]
pub trait ThreadWriteApi: Send + Sync {
    /// Overwrite thread state, optionally as if a given node produced it
    async fn update_thread_state(&self, thread_id: &str, patch: &StatePatch) -> ApiResult<()>;

    /// Start a run resuming an interrupted thread
    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        command: &RunCommand,
    ) -> ApiResult<Run>;
}
