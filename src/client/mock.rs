//! Mock thread API client for testing
//!
//! Provides an in-memory implementation of the API traits with call counting,
//! injectable latency and failures, and concurrency tracking for the state call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::api::{ThreadReadApi, ThreadWriteApi};
use super::models::{Run, RunCommand, Scope, StatePatch, Thread, ThreadFilter, ThreadState};
use crate::error::{ApiError, ApiResult};

/// Mock API client for testing.
///
/// Configure responses via builder methods, then hand it to the sync layer.
///
/// # Example
/// ```ignore
/// let mock = MockThreadsClient::new()
///     .with_threads(vec![thread("t-1", ThreadStatus::Idle, 0)])
///     .await
///     .with_state_delay(Duration::from_millis(50));
/// ```
#[derive(Default)]
pub struct MockThreadsClient {
    /// Threads served by search and get
    threads: Arc<Mutex<Vec<Thread>>>,
    /// State snapshots by thread ID; missing IDs get an empty state
    states: Arc<Mutex<HashMap<String, ThreadState>>>,
    /// Threads whose state call always fails
    failing_states: Arc<Mutex<HashSet<String>>>,
    /// Persistent search failure
    search_error: Arc<Mutex<Option<ApiError>>>,
    /// Error to return on the next call, consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    /// Latency of each state call
    state_delay: Duration,
    /// Latency of each search call
    search_delay: Duration,
    /// Latency of each get-thread call
    get_delay: Duration,
    call_count: Arc<Mutex<CallCounts>>,
    /// Start time of every state call
    state_call_times: Arc<Mutex<Vec<Instant>>>,
    /// Thread ID of every state call, in call order
    state_call_ids: Arc<Mutex<Vec<String>>>,
    state_in_flight: Arc<AtomicUsize>,
    state_max_in_flight: Arc<AtomicUsize>,
    /// Captured mutations for assertions
    updates: Arc<Mutex<Vec<(String, StatePatch)>>>,
    runs: Arc<Mutex<Vec<(String, String, RunCommand)>>>,
}

/// Tracks API call counts for test verification
#[derive(Default, Debug, Clone)]
pub struct CallCounts {
    pub search_threads: usize,
    pub get_thread: usize,
    pub get_thread_state: usize,
    pub update_thread_state: usize,
    pub create_run: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.search_threads
            + self.get_thread
            + self.get_thread_state
            + self.update_thread_state
            + self.create_run
    }
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockThreadsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_threads(self, threads: Vec<Thread>) -> Self {
        *self.threads.lock().await = threads;
        self
    }

    pub async fn with_state(self, thread_id: &str, state: ThreadState) -> Self {
        self.states.lock().await.insert(thread_id.to_string(), state);
        self
    }

    /// Make every state call for `thread_id` fail with a server error.
    pub async fn with_failing_state(self, thread_id: &str) -> Self {
        self.failing_states
            .lock()
            .await
            .insert(thread_id.to_string());
        self
    }

    pub async fn with_search_error(self, error: ApiError) -> Self {
        *self.search_error.lock().await = Some(error);
        self
    }

    /// Configure an error to return on the next API call.
    pub async fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().await = Some(error);
        self
    }

    pub fn with_state_delay(mut self, delay: Duration) -> Self {
        self.state_delay = delay;
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }

    /// Highest number of state calls that were pending at the same time.
    pub fn max_concurrent_state_calls(&self) -> usize {
        self.state_max_in_flight.load(Ordering::SeqCst)
    }

    pub fn state_calls_in_flight(&self) -> usize {
        self.state_in_flight.load(Ordering::SeqCst)
    }

    pub async fn state_call_times(&self) -> Vec<Instant> {
        self.state_call_times.lock().await.clone()
    }

    pub async fn state_call_ids(&self) -> Vec<String> {
        self.state_call_ids.lock().await.clone()
    }

    pub async fn updates(&self) -> Vec<(String, StatePatch)> {
        self.updates.lock().await.clone()
    }

    pub async fn runs(&self) -> Vec<(String, String, RunCommand)> {
        self.runs.lock().await.clone()
    }

    /// Replace served threads after construction.
    pub async fn set_threads(&self, threads: Vec<Thread>) {
        *self.threads.lock().await = threads;
    }

    async fn check_error(&self) -> ApiResult<()> {
        match self.error.lock().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ThreadReadApi for MockThreadsClient {
    async fn search_threads(
        &self,
        _scope: &Scope,
        filter: &ThreadFilter,
    ) -> ApiResult<Vec<Thread>> {
        self.call_count.lock().await.search_threads += 1;
        if !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }
        self.check_error().await?;
        if let Some(e) = self.search_error.lock().await.clone() {
            return Err(e);
        }

        let status = filter.status();
        Ok(self
            .threads
            .lock()
            .await
            .iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn get_thread(&self, thread_id: &str) -> ApiResult<Thread> {
        self.call_count.lock().await.get_thread += 1;
        if !self.get_delay.is_zero() {
            tokio::time::sleep(self.get_delay).await;
        }
        self.check_error().await?;

        self.threads
            .lock()
            .await
            .iter()
            .find(|t| t.thread_id == thread_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("thread {}", thread_id)))
    }

    async fn get_thread_state(&self, thread_id: &str) -> ApiResult<ThreadState> {
        self.call_count.lock().await.get_thread_state += 1;
        self.state_call_times.lock().await.push(Instant::now());
        self.state_call_ids.lock().await.push(thread_id.to_string());

        let current = self.state_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state_max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(self.state_in_flight.clone());

        if !self.state_delay.is_zero() {
            tokio::time::sleep(self.state_delay).await;
        }
        self.check_error().await?;

        if self.failing_states.lock().await.contains(thread_id) {
            return Err(ApiError::ServerError(format!("state of {} unavailable", thread_id)));
        }

        Ok(self
            .states
            .lock()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ThreadWriteApi for MockThreadsClient {
    async fn update_thread_state(&self, thread_id: &str, patch: &StatePatch) -> ApiResult<()> {
        self.call_count.lock().await.update_thread_state += 1;
        self.check_error().await?;

        self.updates
            .lock()
            .await
            .push((thread_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        command: &RunCommand,
    ) -> ApiResult<Run> {
        let count = {
            let mut counts = self.call_count.lock().await;
            counts.create_run += 1;
            counts.create_run
        };
        self.check_error().await?;

        self.runs.lock().await.push((
            thread_id.to_string(),
            assistant_id.to_string(),
            command.clone(),
        ));
        Ok(Run {
            run_id: format!("run-{}", count),
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            status: "pending".to_string(),
            created_at: None,
        })
    }
}

/// Test thread builders
pub mod fixtures {
    use std::collections::BTreeMap;

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{Value, json};

    use crate::client::models::{Interrupt, Thread, ThreadState, ThreadStatus, ThreadTask};

    /// Thread created `minutes_ago` minutes before a fixed reference time.
    pub fn thread(id: &str, status: ThreadStatus, minutes_ago: i64) -> Thread {
        let reference = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        Thread {
            thread_id: id.to_string(),
            created_at: reference - Duration::minutes(minutes_ago),
            updated_at: None,
            status,
            metadata: json!({ "assistant_id": "agent-1" }),
            values: json!({ "messages": [{ "type": "human", "content": format!("task {}", id) }] }),
            interrupts: BTreeMap::new(),
        }
    }

    pub fn interrupt(action: &str) -> Interrupt {
        Interrupt {
            value: json!({
                "action_request": { "action": action, "args": {} },
                "config": { "allow_accept": true, "allow_ignore": true },
                "description": format!("review {}", action)
            }),
            id: None,
            when: Some("during".to_string()),
        }
    }

    /// Interrupted thread whose summary already embeds an interrupt.
    pub fn interrupted_with_embedded(id: &str, minutes_ago: i64) -> Thread {
        let mut t = thread(id, ThreadStatus::Interrupted, minutes_ago);
        t.interrupts
            .insert("task-1".to_string(), vec![interrupt("approve")]);
        t
    }

    pub fn state_with_interrupt(action: &str) -> ThreadState {
        ThreadState {
            values: Value::Null,
            next: vec!["human_review".to_string()],
            tasks: vec![ThreadTask {
                id: "task-1".to_string(),
                name: "human_review".to_string(),
                interrupts: vec![interrupt(action)],
                error: None,
            }],
            ..Default::default()
        }
    }
}
