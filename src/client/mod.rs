//! Orchestration service client

pub mod api;
#[cfg(test)]
pub mod mock;
pub mod langgraph;
pub mod models;

pub use api::{ThreadReadApi, ThreadWriteApi};
pub use langgraph::LangGraphClient;
#[cfg(test)]
#[allow(unused_imports)]
pub use mock::MockThreadsClient;

/// Full thread API surface
///
/// Anything implementing both sub-traits is a `ThreadsApi`; the sync layer is
/// generic over it so tests can swap in [`MockThreadsClient`].
pub trait ThreadsApi: ThreadReadApi + ThreadWriteApi {}

impl<T: ThreadReadApi + ThreadWriteApi> ThreadsApi for T {}
