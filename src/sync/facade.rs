//! Per-scope synchronization facade
//!
//! [`ThreadSync`] owns every cache, deduplicator, breaker and scheduler for one
//! agent/deployment scope. Callers get plain async results; UI-style consumers
//! can also [`subscribe`](ThreadSync::subscribe) to the current [`ThreadView`].

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::SyncOptions;
use super::batch::BatchStateFetcher;
use super::breaker::CircuitBreaker;
use super::dedup::RequestDeduplicator;
use super::prefetch::PrefetchScheduler;
use super::retry::RetryingFetcher;
use super::timing::{MetricSummary, PerfMonitor};
use crate::cache::{CacheBackend, CacheKey, Endpoint, KeyFilter, TtlCache};
use crate::client::ThreadsApi;
use crate::client::models::{
    HumanResponse, Inbox, Run, RunCommand, Scope, StatePatch, Thread, ThreadDetail, ThreadFilter,
};
use crate::error::{ApiError, SyncError, SyncResult};

/// One page of enriched threads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadList {
    pub threads: Vec<ThreadDetail>,
    pub has_more: bool,
    /// Served from the list cache rather than a fresh search
    #[serde(default)]
    pub from_cache: bool,
}

/// Latest list state published to subscribers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadView {
    pub threads: Vec<ThreadDetail>,
    pub has_more: bool,
    pub from_cache: bool,
    pub loading: bool,
    /// Last list-level failure; cleared by the next successful load
    pub error: Option<String>,
}

struct Inner<C> {
    client: Arc<C>,
    scope: Scope,
    options: SyncOptions,
    lists: TtlCache<ThreadList>,
    details: TtlCache<ThreadDetail>,
    list_dedup: RequestDeduplicator<CacheKey, ThreadList>,
    detail_dedup: RequestDeduplicator<CacheKey, Option<ThreadDetail>>,
    states: Arc<BatchStateFetcher<C>>,
    prefetch: PrefetchScheduler<C>,
    retry: RetryingFetcher,
    perf: PerfMonitor,
    view: watch::Sender<ThreadView>,
    shutdown: CancellationToken,
    current: Mutex<CancellationToken>,
    background: Mutex<Option<JoinHandle<()>>>,
    /// Thread last opened through `fetch_thread_detail`; prefetched first
    open_thread: Mutex<Option<String>>,
    /// Held while a load commits its page and while a write invalidates, so a
    /// load that started before a write never lands after it.
    commit: Mutex<()>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Thread synchronization for one scope.
///
/// Dropping the facade cancels all work derived from it, including background
/// refreshes and prefetches.
pub struct ThreadSync<C> {
    inner: Arc<Inner<C>>,
}

impl<C: ThreadsApi + 'static> ThreadSync<C> {
    /// Create a facade; `backend` makes the thread-list cache durable.
    pub fn new(
        client: Arc<C>,
        scope: Scope,
        options: SyncOptions,
        backend: Option<Arc<dyn CacheBackend>>,
    ) -> Self {
        let mut lists = TtlCache::new("threads", options.list_ttl);
        if let Some(backend) = backend {
            lists = lists.with_backend(
                backend,
                KeyFilter::scope(&scope).endpoint(Endpoint::Threads),
            );
        }

        let states = Arc::new(BatchStateFetcher::new(client.clone(), scope.clone(), &options));
        let prefetch = PrefetchScheduler::new(states.clone(), options.prefetch.clone());
        let (view, _) = watch::channel(ThreadView::default());
        let shutdown = CancellationToken::new();

        Self {
            inner: Arc::new(Inner {
                details: TtlCache::new("thread", options.state_ttl)
                    .bounded(options.state_cache_max_entries),
                retry: RetryingFetcher::new(options.search_policy.clone()),
                current: Mutex::new(shutdown.child_token()),
                client,
                scope,
                options,
                lists,
                list_dedup: RequestDeduplicator::new(),
                detail_dedup: RequestDeduplicator::new(),
                states,
                prefetch,
                perf: PerfMonitor::new(),
                view,
                shutdown,
                background: Mutex::new(None),
                open_thread: Mutex::new(None),
                commit: Mutex::new(()),
            }),
        }
    }

    #[allow(dead_code)]
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        self.inner.states.breaker()
    }

    #[allow(dead_code)]
    pub fn prefetch(&self) -> &PrefetchScheduler<C> {
        &self.inner.prefetch
    }

    #[allow(dead_code)]
    pub fn subscribe(&self) -> watch::Receiver<ThreadView> {
        self.inner.view.subscribe()
    }

    #[allow(dead_code)]
    pub fn timings(&self) -> Vec<MetricSummary> {
        self.inner.perf.summary()
    }

    pub fn perf(&self) -> &PerfMonitor {
        &self.inner.perf
    }

    /// Cancel the previous list fetch and hand out a token for the next one.
    fn supersede(&self) -> CancellationToken {
        let next = self.inner.shutdown.child_token();
        let previous = std::mem::replace(&mut *lock(&self.inner.current), next.clone());
        previous.cancel();
        next
    }

    /// Fetch one page of enriched threads.
    ///
    /// A cached page is returned immediately; once it is older than the
    /// staleness threshold a background refresh updates the cache and the view.
    /// Starting a new fetch cancels the one before it.
    pub async fn fetch_threads(&self, filter: &ThreadFilter) -> SyncResult<ThreadList> {
        filter.validate()?;
        let cancel = self.supersede();
        let key = self.inner.list_key(filter);

        if let Some((mut list, age)) = self.inner.lists.lookup(&key) {
            let stale = age > self.inner.options.list_stale_after;
            debug!(
                "Serving {} threads from cache (age {:?}{})",
                list.threads.len(),
                age,
                if stale { ", refreshing" } else { "" }
            );
            list.from_cache = true;
            self.inner.publish(&list, stale);
            self.inner.schedule_prefetch(&list);
            if stale {
                self.spawn_refresh(filter.clone(), key, cancel);
            }
            return Ok(list);
        }

        self.inner.view.send_modify(|view| {
            view.loading = true;
            view.error = None;
        });
        let result = self.inner.load(filter, key, &cancel).await;
        self.inner.settle_view(&result, &cancel);
        if let Ok(list) = &result {
            self.inner.schedule_prefetch(list);
        }
        result
    }

    fn spawn_refresh(&self, filter: ThreadFilter, key: CacheKey, cancel: CancellationToken) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let result = inner.load(&filter, key, &cancel).await;
            if let Err(e) = &result
                && !matches!(e, SyncError::Cancelled)
            {
                warn!("Background refresh failed: {}", e);
            }
            inner.settle_view(&result, &cancel);
        });

        if let Some(previous) = lock(&self.inner.background).replace(handle) {
            previous.abort();
        }
    }

    /// Wait for a pending background refresh, if any.
    pub async fn settle(&self) {
        let handle = lock(&self.inner.background).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Drop the cached page and any breaker state, then fetch again.
    pub async fn refresh(&self, filter: &ThreadFilter) -> SyncResult<ThreadList> {
        self.breaker().reset();
        self.inner.lists.invalidate(&self.inner.list_key(filter));
        self.fetch_threads(filter).await
    }

    /// Open a single thread with its interrupts; `None` when it does not exist.
    ///
    /// The thread stays the open one, first in line for prefetching, until
    /// another is opened or [`close_thread`](Self::close_thread) is called.
    /// Concurrent opens of the same thread share one lookup.
    pub async fn fetch_thread_detail(&self, thread_id: &str) -> SyncResult<Option<ThreadDetail>> {
        *lock(&self.inner.open_thread) = Some(thread_id.to_string());

        let key = CacheKey::new(Endpoint::Thread, &self.inner.scope).with_thread(thread_id);
        if let Some(detail) = self.inner.details.get(&key) {
            return Ok(Some(detail));
        }

        let inner = &self.inner;
        let cancel = inner.shutdown.child_token();

        inner
            .detail_dedup
            .run(key.clone(), || async {
                if let Some(detail) = inner.details.get(&key) {
                    return Ok(Some(detail));
                }
                let _timer = inner.perf.start("fetch_thread_detail");

                let thread: Thread = match inner
                    .retry
                    .call(&cancel, || inner.client.get_thread(thread_id))
                    .await
                {
                    Ok(thread) => thread,
                    Err(SyncError::Upstream(ApiError::NotFound(_))) => return Ok(None),
                    Err(e) => return Err(e),
                };

                let detail = inner
                    .states
                    .process(vec![thread], Inbox::All, &cancel)
                    .await?
                    .into_iter()
                    .next();

                if let Some(detail) = &detail
                    && detail.can_show_detail()
                {
                    inner.details.set(key.clone(), detail);
                }
                Ok(detail)
            })
            .await
    }

    /// No thread is open any more.
    #[allow(dead_code)]
    pub fn close_thread(&self) {
        lock(&self.inner.open_thread).take();
    }

    /// Apply a state patch, then drop every cached entry it may have changed.
    pub async fn mutate(&self, thread_id: &str, patch: &StatePatch) -> SyncResult<()> {
        let _timer = self.inner.perf.start("mutate");
        self.inner
            .client
            .update_thread_state(thread_id, patch)
            .await?;
        self.after_write(thread_id);
        Ok(())
    }

    /// End the thread without responding and drop it from the current view.
    pub async fn ignore_thread(&self, thread_id: &str) -> SyncResult<()> {
        self.mutate(thread_id, &StatePatch::ignore()).await?;
        self.inner.view.send_modify(|view| {
            view.threads.retain(|d| d.thread_id() != thread_id);
        });
        Ok(())
    }

    /// Resume an interrupted thread with the given responses.
    pub async fn send_response(
        &self,
        thread_id: &str,
        responses: Vec<HumanResponse>,
    ) -> SyncResult<Run> {
        let _timer = self.inner.perf.start("send_response");
        let command = RunCommand { resume: responses };
        let run = self
            .inner
            .client
            .create_run(thread_id, &self.inner.scope.agent_id, &command)
            .await?;
        self.after_write(thread_id);
        Ok(run)
    }

    /// Cancel list loads that started before a successful write, then drop every
    /// cached entry the write may have changed.
    fn after_write(&self, thread_id: &str) {
        let _commit = lock(&self.inner.commit);
        self.supersede();
        if let Some(refresh) = lock(&self.inner.background).take() {
            refresh.abort();
        }
        self.inner.invalidate_thread(thread_id);
        self.inner.view.send_modify(|view| view.loading = false);
    }

    /// Thread gained hover/focus in a list view.
    #[allow(dead_code)]
    pub fn hover_start(&self, thread: &Thread) {
        self.inner.prefetch.hover_start(thread);
    }

    #[allow(dead_code)]
    pub fn hover_end(&self, thread_id: &str) {
        self.inner.prefetch.hover_end(thread_id);
    }

    /// Cancel every fetch, refresh and prefetch derived from this facade.
    #[allow(dead_code)]
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.prefetch.shutdown();
    }
}

impl<C> Drop for ThreadSync<C> {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl<C: ThreadsApi + 'static> Inner<C> {
    fn list_key(&self, filter: &ThreadFilter) -> CacheKey {
        CacheKey::new(Endpoint::Threads, &self.scope).with_params(filter.cache_params())
    }

    /// Search, enrich and cache one page. Concurrent loads of the same page share
    /// one search.
    async fn load(
        &self,
        filter: &ThreadFilter,
        key: CacheKey,
        cancel: &CancellationToken,
    ) -> SyncResult<ThreadList> {
        self.list_dedup
            .run(key.clone(), || async {
                let _timer = self.perf.start("fetch_threads");

                let threads = self
                    .retry
                    .call(cancel, || self.client.search_threads(&self.scope, filter))
                    .await?;
                debug!("Search returned {} threads", threads.len());

                let mut details = self.states.process(threads, filter.inbox, cancel).await?;
                details.sort_by(|a, b| b.thread.created_at.cmp(&a.thread.created_at));

                let list = ThreadList {
                    has_more: details.len() == filter.limit,
                    threads: details,
                    from_cache: false,
                };
                let _commit = lock(&self.commit);
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                self.lists.set(key, &list);
                Ok(list)
            })
            .await
    }

    fn publish(&self, list: &ThreadList, loading: bool) {
        self.view.send_replace(ThreadView {
            threads: list.threads.clone(),
            has_more: list.has_more,
            from_cache: list.from_cache,
            loading,
            error: None,
        });
    }

    /// Reflect a finished load in the view. A cancelled or superseded load
    /// leaves it alone.
    fn settle_view(&self, result: &SyncResult<ThreadList>, cancel: &CancellationToken) {
        let _commit = lock(&self.commit);
        if cancel.is_cancelled() {
            return;
        }
        match result {
            Ok(list) => self.publish(list, false),
            Err(SyncError::Cancelled) => {}
            Err(e) => self.view.send_modify(|view| {
                view.loading = false;
                view.error = Some(e.to_string());
            }),
        }
    }

    fn schedule_prefetch(&self, list: &ThreadList) {
        let threads: Vec<Thread> = list.threads.iter().map(|d| d.thread.clone()).collect();
        let open = lock(&self.open_thread).clone();
        self.prefetch.schedule(&threads, open.as_deref());
    }

    fn invalidate_thread(&self, thread_id: &str) {
        let thread = KeyFilter::scope(&self.scope).thread(thread_id);
        self.states.cache().invalidate_matching(&thread);
        self.details.invalidate_matching(&thread);
        self.lists
            .invalidate_matching(&KeyFilter::scope(&self.scope).endpoint(Endpoint::Threads));
        debug!("Invalidated cached entries for {}", thread_id);
    }
}
