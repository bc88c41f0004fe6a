//! Single-flight request deduplication
//!
//! Concurrent callers asking for the same key share one in-flight request. The
//! first caller (the leader) runs the factory; everyone else subscribes to a
//! broadcast of its result.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use tokio::sync::broadcast;

use crate::error::{SyncError, SyncResult};

type Pending<K, V> = HashMap<K, broadcast::Sender<SyncResult<V>>>;

pub struct RequestDeduplicator<K, V> {
    pending: Mutex<Pending<K, V>>,
}

impl<K, V> Default for RequestDeduplicator<K, V> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

/// Removes the leader's entry if its future is dropped before settling.
struct LeaderGuard<'a, K: Eq + Hash, V> {
    pending: &'a Mutex<Pending<K, V>>,
    key: &'a K,
    armed: bool,
}

impl<K: Eq + Hash, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        if self.armed {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(self.key);
        }
    }
}

impl<K, V> RequestDeduplicator<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Pending<K, V>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `factory` for `key` unless a request for it is already in flight, in
    /// which case wait for and share that result.
    ///
    /// The key leaves the pending set before the result is published. A leader
    /// that is dropped or settles with [`SyncError::Cancelled`] publishes nothing;
    /// its waiters then run `factory` themselves.
    pub async fn run<F, Fut>(&self, key: K, factory: F) -> SyncResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<V>>,
    {
        let tx = loop {
            let mut rx = {
                let mut pending = self.pending();
                match pending.get(&key) {
                    Some(tx) => tx.subscribe(),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        pending.insert(key.clone(), tx.clone());
                        break tx;
                    }
                }
            };

            debug!("Joining in-flight request {:?}", key);
            match rx.recv().await {
                Ok(result) => return result,
                Err(_) => debug!("Leader for {:?} abandoned; retrying", key),
            }
        };

        let mut guard = LeaderGuard {
            pending: &self.pending,
            key: &key,
            armed: true,
        };

        let result = factory().await;

        let mut pending = self.pending();
        pending.remove(&key);
        guard.armed = false;
        if !matches!(result, Err(SyncError::Cancelled)) {
            // Held under the lock so no new caller slips in between removal and send.
            let _ = tx.send(result.clone());
        }
        drop(pending);

        result
    }

    #[allow(dead_code)]
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }
}
