//! Predictive prefetching of thread state
//!
//! Warms the state cache for threads the user is likely to open next, off the
//! interaction path. Only threads that would need the expensive state call are
//! considered.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use log::debug;
use tokio_util::sync::CancellationToken;

use super::batch::{BatchStateFetcher, StateOutcome, needs_state};
use crate::client::ThreadsApi;
use crate::client::models::Thread;

#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchConfig {
    /// How many of the most recent threads to warm
    pub recent: usize,
    /// Upper bound on threads created today
    pub today: usize,
    /// Gap between consecutive scheduled fetches
    pub stagger: Duration,
    /// Hover time before a hover triggers a fetch
    pub hover_debounce: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            recent: 3,
            today: 5,
            stagger: Duration::from_millis(100),
            hover_debounce: Duration::from_millis(200),
        }
    }
}

/// Pick prefetch candidates in priority order: the open thread, the most recent
/// threads, then threads created on `today` (local time).
pub fn candidates(
    threads: &[Thread],
    current: Option<&str>,
    today: NaiveDate,
    config: &PrefetchConfig,
) -> Vec<String> {
    let mut eligible: Vec<&Thread> = threads.iter().filter(|t| needs_state(t)).collect();
    eligible.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut picked: Vec<String> = Vec::new();
    let mut push = |id: &str| {
        if !picked.iter().any(|p| p == id) {
            picked.push(id.to_string());
        }
    };

    if let Some(current) = current
        && eligible.iter().any(|t| t.thread_id == current)
    {
        push(current);
    }

    for t in eligible.iter().take(config.recent) {
        push(&t.thread_id);
    }

    for t in eligible
        .iter()
        .filter(|t| t.created_at.with_timezone(&Local).date_naive() == today)
        .take(config.today)
    {
        push(&t.thread_id);
    }

    picked
}

pub struct PrefetchScheduler<C> {
    fetcher: Arc<BatchStateFetcher<C>>,
    config: PrefetchConfig,
    shutdown: CancellationToken,
    /// Threads fetched or queued; a fetch that does not resolve leaves the set.
    prefetched: Arc<Mutex<HashSet<String>>>,
    /// Pending hover timers by thread, tagged with a generation so a finished
    /// timer only removes its own entry.
    hovers: Arc<Mutex<HashMap<String, (u64, CancellationToken)>>>,
    generation: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl<C: ThreadsApi + 'static> PrefetchScheduler<C> {
    pub fn new(fetcher: Arc<BatchStateFetcher<C>>, config: PrefetchConfig) -> Self {
        Self {
            fetcher,
            config,
            shutdown: CancellationToken::new(),
            prefetched: Arc::new(Mutex::new(HashSet::new())),
            hovers: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Schedule prefetches for a freshly shown thread list.
    pub fn schedule(&self, threads: &[Thread], current: Option<&str>) {
        self.schedule_on(threads, current, Local::now().date_naive());
    }

    pub fn schedule_on(&self, threads: &[Thread], current: Option<&str>, today: NaiveDate) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let mut picked = Vec::new();
        {
            let mut prefetched = lock(&self.prefetched);
            for id in candidates(threads, current, today, &self.config) {
                if !prefetched.contains(&id) && !self.fetcher.is_cached(&id) {
                    prefetched.insert(id.clone());
                    picked.push(id);
                }
            }
        }

        if picked.is_empty() {
            return;
        }
        debug!("Prefetching state for {} threads", picked.len());

        for (i, thread_id) in picked.into_iter().enumerate() {
            let delay = self.config.stagger.saturating_mul(i as u32);
            let token = self.shutdown.child_token();
            let fetcher = self.fetcher.clone();
            let prefetched = self.prefetched.clone();

            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                debug!("Prefetch {} after {:?}", thread_id, delay);
                let outcome = fetcher.fetch_state(&thread_id, &token).await;
                forget_unresolved(&prefetched, &thread_id, &outcome);
            });
        }
    }

    /// A thread gained hover/focus; fetch it if the hover lasts past the debounce.
    pub fn hover_start(&self, thread: &Thread) {
        if self.shutdown.is_cancelled()
            || !needs_state(thread)
            || lock(&self.prefetched).contains(&thread.thread_id)
            || self.fetcher.is_cached(&thread.thread_id)
        {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = self.shutdown.child_token();
        if let Some((_, previous)) = lock(&self.hovers)
            .insert(thread.thread_id.clone(), (generation, token.clone()))
        {
            previous.cancel();
        }

        let thread_id = thread.thread_id.clone();
        let debounce = self.config.hover_debounce;
        let fetcher = self.fetcher.clone();
        let hovers = self.hovers.clone();
        let prefetched = self.prefetched.clone();
        lock(&prefetched).insert(thread_id.clone());

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            {
                let mut hovers = lock(&hovers);
                if hovers.get(&thread_id).is_some_and(|(g, _)| *g == generation) {
                    hovers.remove(&thread_id);
                }
            }
            debug!("Hover prefetch {}", thread_id);
            let outcome = fetcher.fetch_state(&thread_id, &token).await;
            forget_unresolved(&prefetched, &thread_id, &outcome);
        });
    }

    /// The hover ended; a fetch still waiting on its debounce is dropped.
    pub fn hover_end(&self, thread_id: &str) {
        if let Some((_, token)) = lock(&self.hovers).remove(thread_id) {
            token.cancel();
            lock(&self.prefetched).remove(thread_id);
        }
    }

    /// Cancel all scheduled and running prefetch work.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        lock(&self.hovers).clear();
    }

    #[allow(dead_code)]
    pub fn is_prefetched(&self, thread_id: &str) -> bool {
        lock(&self.prefetched).contains(thread_id)
    }
}

/// Let a failed or skipped prefetch be tried again later.
fn forget_unresolved(prefetched: &Mutex<HashSet<String>>, thread_id: &str, outcome: &StateOutcome) {
    if !matches!(outcome, StateOutcome::Resolved(_)) {
        debug!("Prefetch of {} did not resolve", thread_id);
        lock(prefetched).remove(thread_id);
    }
}

impl<C> Drop for PrefetchScheduler<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
