//! Wave-based batch fetching of thread state
//!
//! Threads whose interrupts are not embedded in the summary need one expensive
//! `get_thread_state` call each. Those calls run in waves bounded by the
//! configured concurrency; each call goes through the state cache, the circuit
//! breaker, the deduplicator and the retrying fetcher. Every state call, prefetches
//! included, holds a permit from one semaphore of the same size.

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::SyncOptions;
use super::breaker::CircuitBreaker;
use super::dedup::RequestDeduplicator;
use super::interrupts;
use super::retry::RetryingFetcher;
use crate::cache::{CacheKey, Endpoint, TtlCache};
use crate::client::ThreadsApi;
use crate::client::models::{
    Inbox, InboxStatus, Scope, Thread, ThreadDetail, ThreadState, ThreadStatus,
};
use crate::error::{SyncError, SyncResult};

/// Result of resolving one thread's state
#[derive(Debug, Clone, PartialEq)]
pub enum StateOutcome {
    Resolved(ThreadState),
    /// The breaker was open; the call was skipped.
    Degraded,
    Failed(SyncError),
}

pub struct BatchStateFetcher<C> {
    client: Arc<C>,
    scope: Scope,
    cache: TtlCache<ThreadState>,
    dedup: RequestDeduplicator<String, ThreadState>,
    breaker: CircuitBreaker,
    retry: RetryingFetcher,
    concurrency: usize,
    permits: Semaphore,
}

/// Does this thread need the expensive state call to be shown?
pub fn needs_state(thread: &Thread) -> bool {
    thread.status == ThreadStatus::Interrupted && interrupts::from_thread(thread).is_none()
}

impl<C: ThreadsApi> BatchStateFetcher<C> {
    pub fn new(client: Arc<C>, scope: Scope, options: &SyncOptions) -> Self {
        let concurrency = options.concurrency.max(1);
        Self {
            client,
            scope,
            cache: TtlCache::new("state", options.state_ttl)
                .bounded(options.state_cache_max_entries),
            dedup: RequestDeduplicator::new(),
            breaker: CircuitBreaker::new(options.breaker.clone()),
            retry: RetryingFetcher::new(options.state_policy.clone()),
            concurrency,
            permits: Semaphore::new(concurrency),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &TtlCache<ThreadState> {
        &self.cache
    }

    #[allow(dead_code)]
    pub fn in_flight(&self) -> usize {
        self.dedup.pending_count()
    }

    fn state_key(&self, thread_id: &str) -> CacheKey {
        CacheKey::new(Endpoint::ThreadState, &self.scope).with_thread(thread_id)
    }

    pub fn is_cached(&self, thread_id: &str) -> bool {
        self.cache.get(&self.state_key(thread_id)).is_some()
    }

    /// Enrich a list of summaries into details for the given inbox.
    ///
    /// Per-item failures only mark that item; cancellation fails the whole batch.
    pub async fn process(
        &self,
        threads: Vec<Thread>,
        inbox: Inbox,
        cancel: &CancellationToken,
    ) -> SyncResult<Vec<ThreadDetail>> {
        let mut slots: Vec<Option<ThreadDetail>> = Vec::with_capacity(threads.len());
        let mut pending: Vec<(usize, Thread)> = Vec::new();

        for thread in threads {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            if inbox == Inbox::HumanResponseNeeded && thread.status != ThreadStatus::Interrupted {
                let mut detail = ThreadDetail::plain(thread);
                detail.status = InboxStatus::HumanResponseNeeded;
                slots.push(Some(detail));
                continue;
            }

            if thread.status != ThreadStatus::Interrupted {
                slots.push(Some(ThreadDetail::plain(thread)));
                continue;
            }

            match interrupts::from_thread(&thread) {
                Some(found) => {
                    let mut detail = ThreadDetail::plain(thread);
                    detail.invalid_schema = interrupts::is_invalid_schema(&found);
                    detail.interrupts = Some(found);
                    slots.push(Some(detail));
                }
                None => {
                    pending.push((slots.len(), thread));
                    slots.push(None);
                }
            }
        }

        let waves = pending.len().div_ceil(self.concurrency);
        for (n, wave) in pending.chunks(self.concurrency).enumerate() {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            debug!("State wave {}/{}: {} threads", n + 1, waves, wave.len());

            let outcomes =
                join_all(wave.iter().map(|(_, t)| self.fetch_state(&t.thread_id, cancel))).await;

            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            for ((slot, thread), outcome) in wave.iter().zip(outcomes) {
                slots[*slot] = Some(match outcome {
                    StateOutcome::Resolved(state) => detail_from_state(thread.clone(), &state),
                    StateOutcome::Degraded => {
                        let mut detail = ThreadDetail::plain(thread.clone());
                        detail.degraded = true;
                        detail
                    }
                    StateOutcome::Failed(SyncError::Cancelled) => {
                        return Err(SyncError::Cancelled);
                    }
                    StateOutcome::Failed(e) => {
                        warn!("State of {} unavailable: {}", thread.thread_id, e);
                        let mut detail = ThreadDetail::plain(thread.clone());
                        detail.invalid_schema = true;
                        detail
                    }
                });
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Resolve one thread's state: cache, then breaker, then a deduplicated,
    /// retried upstream call.
    pub async fn fetch_state(&self, thread_id: &str, cancel: &CancellationToken) -> StateOutcome {
        let key = self.state_key(thread_id);
        if let Some(state) = self.cache.get(&key) {
            return StateOutcome::Resolved(state);
        }

        if self.breaker.is_open() {
            debug!("Breaker open; skipping state call for {}", thread_id);
            return StateOutcome::Degraded;
        }

        let result = self
            .dedup
            .run(thread_id.to_string(), || async {
                // Another caller may have filled the cache while we waited to lead.
                if let Some(state) = self.cache.get(&key) {
                    return Ok(state);
                }

                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    permit = self.permits.acquire() => {
                        permit.map_err(|_| SyncError::Cancelled)?
                    }
                };

                let result = self
                    .retry
                    .call(cancel, || self.client.get_thread_state(thread_id))
                    .await;

                match &result {
                    Ok(state) if !cancel.is_cancelled() => self.cache.set(key.clone(), state),
                    Err(e) if e.counts_as_failure() => self.breaker.record_failure(),
                    _ => {}
                }
                result
            })
            .await;

        match result {
            Ok(state) => StateOutcome::Resolved(state),
            Err(e) => StateOutcome::Failed(e),
        }
    }
}

/// Build an interrupted detail from a state snapshot.
pub fn detail_from_state(thread: Thread, state: &ThreadState) -> ThreadDetail {
    let found = interrupts::from_state(state);
    let mut detail = ThreadDetail::plain(thread);
    detail.invalid_schema = interrupts::is_invalid_schema(&found);
    detail.interrupts = (!found.is_empty()).then_some(found);
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockThreadsClient;
    use crate::client::mock::fixtures;
    use crate::sync::retry::RetryPolicy;
    use std::time::Duration;
    use tokio::time::Instant;

    fn options(concurrency: usize) -> SyncOptions {
        SyncOptions {
            concurrency,
            state_policy: RetryPolicy::new(Duration::from_secs(15), 0, Duration::from_millis(1000)),
            ..SyncOptions::default()
        }
    }

    fn fetcher(
        client: MockThreadsClient,
        concurrency: usize,
    ) -> (BatchStateFetcher<MockThreadsClient>, Arc<MockThreadsClient>) {
        let client = Arc::new(client);
        let fetcher = BatchStateFetcher::new(
            client.clone(),
            Scope::new("agent-1", "local"),
            &options(concurrency),
        );
        (fetcher, client)
    }

    fn stateless(n: usize) -> Vec<Thread> {
        (0..n)
            .map(|i| fixtures::thread(&format!("t-{}", i), ThreadStatus::Interrupted, i as i64))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_waves_respect_concurrency_bound() {
        let (fetcher, client) = fetcher(
            MockThreadsClient::new().with_state_delay(Duration::from_millis(100)),
            2,
        );
        let start = Instant::now();

        let details = fetcher
            .process(stateless(10), Inbox::All, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(details.len(), 10);
        assert_eq!(client.max_concurrent_state_calls(), 2);
        assert!(Instant::now() - start >= Duration::from_millis(500));

        // Each wave starts only after the previous one settled.
        let times = client.state_call_times().await;
        assert_eq!(times.len(), 10);
        for wave in times.chunks(2) {
            assert_eq!(wave[0], wave[1]);
        }
        for pair in times.chunks(2).collect::<Vec<_>>().windows(2) {
            assert_eq!(pair[1][0] - pair[0][0], Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_side_fetches_share_the_concurrency_bound() {
        let (fetcher, client) = fetcher(
            MockThreadsClient::new().with_state_delay(Duration::from_secs(1)),
            2,
        );
        let cancel = CancellationToken::new();

        let (details, extra_a, extra_b) = tokio::join!(
            fetcher.process(stateless(4), Inbox::All, &cancel),
            fetcher.fetch_state("side-a", &cancel),
            fetcher.fetch_state("side-b", &cancel),
        );

        assert_eq!(details.unwrap().len(), 4);
        assert!(matches!(extra_a, StateOutcome::Resolved(_)));
        assert!(matches!(extra_b, StateOutcome::Resolved(_)));
        assert_eq!(client.call_counts().await.get_thread_state, 6);
        assert_eq!(client.max_concurrent_state_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_waiting_for_a_permit() {
        let (fetcher, client) = fetcher(
            MockThreadsClient::new().with_state_delay(Duration::from_secs(1)),
            1,
        );
        let busy = CancellationToken::new();
        let waiting = CancellationToken::new();

        let trigger = waiting.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let (first, second) = tokio::join!(
            fetcher.fetch_state("t-0", &busy),
            fetcher.fetch_state("t-1", &waiting),
        );

        assert!(matches!(first, StateOutcome::Resolved(_)));
        assert_eq!(second, StateOutcome::Failed(SyncError::Cancelled));
        assert_eq!(client.call_counts().await.get_thread_state, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_fails_batch_and_leaves_nothing_in_flight() {
        let (fetcher, client) = fetcher(
            MockThreadsClient::new().with_state_delay(Duration::from_millis(100)),
            2,
        );
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let result = fetcher.process(stateless(10), Inbox::All, &cancel).await;

        assert_eq!(result, Err(SyncError::Cancelled));
        assert_eq!(fetcher.in_flight(), 0);
        assert_eq!(client.state_calls_in_flight(), 0);
        // Only the first, completed wave reached the cache.
        assert_eq!(fetcher.cache().len(), 2);
        assert_eq!(client.call_counts().await.get_thread_state, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_paths_skip_state_calls() {
        let (fetcher, client) = fetcher(MockThreadsClient::new(), 5);
        let threads = vec![
            fixtures::thread("idle", ThreadStatus::Idle, 0),
            fixtures::thread("busy", ThreadStatus::Busy, 1),
            fixtures::interrupted_with_embedded("embedded", 2),
        ];

        let details = fetcher
            .process(threads, Inbox::All, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.call_counts().await.get_thread_state, 0);
        assert_eq!(details[0].status, InboxStatus::Idle);
        assert_eq!(details[2].status, InboxStatus::Interrupted);
        assert_eq!(details[2].interrupts.as_ref().map(Vec::len), Some(1));
        assert!(!details[2].invalid_schema);
    }

    #[tokio::test(start_paused = true)]
    async fn test_human_response_needed_inbox() {
        let (fetcher, _client) = fetcher(MockThreadsClient::new(), 5);
        let threads = vec![
            fixtures::thread("idle", ThreadStatus::Idle, 0),
            fixtures::interrupted_with_embedded("embedded", 1),
        ];

        let details = fetcher
            .process(threads, Inbox::HumanResponseNeeded, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(details[0].status, InboxStatus::HumanResponseNeeded);
        assert_eq!(details[1].status, InboxStatus::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_interrupts_and_invalid_schema() {
        let client = MockThreadsClient::new()
            .with_state("t-0", fixtures::state_with_interrupt("approve"))
            .await;
        let (fetcher, _client) = fetcher(client, 5);

        let details = fetcher
            .process(stateless(2), Inbox::All, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!details[0].invalid_schema);
        assert_eq!(details[0].interrupts.as_ref().map(Vec::len), Some(1));
        // t-1 has an empty state: nothing to show.
        assert!(details[1].invalid_schema);
        assert!(details[1].interrupts.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_failure_degrades_only_that_item() {
        let client = MockThreadsClient::new()
            .with_state("t-0", fixtures::state_with_interrupt("a"))
            .await
            .with_state("t-2", fixtures::state_with_interrupt("b"))
            .await
            .with_failing_state("t-1")
            .await;
        let (fetcher, _client) = fetcher(client, 5);

        let details = fetcher
            .process(stateless(3), Inbox::All, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(details.len(), 3);
        assert!(details[1].invalid_schema);
        assert!(!details[1].degraded);
        assert!(!details[0].invalid_schema);
        assert!(!details[2].invalid_schema);
        assert_eq!(fetcher.breaker().snapshot().failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_marks_items_degraded() {
        let (fetcher, client) = fetcher(MockThreadsClient::new(), 5);
        for _ in 0..3 {
            fetcher.breaker().record_failure();
        }

        let details = fetcher
            .process(stateless(3), Inbox::All, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.call_counts().await.get_thread_state, 0);
        assert!(details.iter().all(|d| d.degraded && !d.can_show_detail()));
        assert!(details.iter().all(|d| !d.invalid_schema));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_state_is_reused() {
        let (fetcher, client) = fetcher(MockThreadsClient::new(), 5);
        let cancel = CancellationToken::new();

        fetcher.process(stateless(3), Inbox::All, &cancel).await.unwrap();
        fetcher.process(stateless(3), Inbox::All, &cancel).await.unwrap();
        assert_eq!(client.call_counts().await.get_thread_state, 3);

        tokio::time::advance(Duration::from_secs(31)).await;
        fetcher.process(stateless(3), Inbox::All, &cancel).await.unwrap();
        assert_eq!(client.call_counts().await.get_thread_state, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_threads_share_one_call() {
        let (fetcher, client) = fetcher(
            MockThreadsClient::new().with_state_delay(Duration::from_millis(50)),
            5,
        );
        let mut threads = stateless(1);
        threads.push(threads[0].clone());

        let details = fetcher
            .process(threads, Inbox::All, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(details.len(), 2);
        assert_eq!(client.call_counts().await.get_thread_state, 1);
    }
}
