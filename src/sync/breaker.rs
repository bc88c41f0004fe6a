//! Failure-window circuit breaker guarding the expensive state call

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    /// Failures older than this no longer count
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            window: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub failure_threshold: u32,
    pub window_ms: u64,
    pub failure_count: u32,
    pub open: bool,
    /// Time since the last recorded failure, if any.
    pub since_last_failure_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

impl State {
    /// Forget failures once the window since the last one has elapsed.
    fn expire(&mut self, now: Instant, window: Duration) {
        if let Some(last) = self.last_failure_at
            && now.saturating_duration_since(last) > window
        {
            self.failure_count = 0;
            self.last_failure_at = None;
        }
    }
}

/// Counts failures inside a sliding window.
///
/// Open while `failure_count >= threshold` and the last failure is within the
/// window. There is no half-open state: the first read after the window elapses
/// closes the breaker and zeroes the count.
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_open(&self) -> bool {
        let mut st = self.state();
        st.expire(Instant::now(), self.cfg.window);
        st.failure_count >= self.cfg.failure_threshold
    }

    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut st = self.state();
        st.expire(now, self.cfg.window);
        st.failure_count = st.failure_count.saturating_add(1);
        st.last_failure_at = Some(now);

        if st.failure_count == self.cfg.failure_threshold {
            warn!(
                "Circuit breaker opened after {} failures; skipping state calls for {:?}",
                st.failure_count, self.cfg.window
            );
        } else {
            debug!(
                "Circuit breaker failure {}/{}",
                st.failure_count, self.cfg.failure_threshold
            );
        }
    }

    /// Clear all failures, closing the breaker.
    pub fn reset(&self) {
        let mut st = self.state();
        st.failure_count = 0;
        st.last_failure_at = None;
    }

    #[allow(dead_code)]
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let mut st = self.state();
        st.expire(now, self.cfg.window);
        CircuitBreakerSnapshot {
            failure_threshold: self.cfg.failure_threshold,
            window_ms: self.cfg.window.as_millis() as u64,
            failure_count: st.failure_count,
            open: st.failure_count >= self.cfg.failure_threshold,
            since_last_failure_ms: st
                .last_failure_at
                .map(|last| now.saturating_duration_since(last).as_millis() as u64),
        }
    }
}
