//! Named operation timings

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;
use serde::Serialize;
use tokio::time::Instant;

/// How many recent measurements are kept
const MAX_METRICS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub duration_ms: f64,
}

/// Aggregate for one operation name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub count: usize,
    pub average_ms: f64,
    pub max_ms: f64,
}

/// Records how long named operations take, keeping the last 100 samples.
#[derive(Debug, Default)]
pub struct PerfMonitor {
    metrics: Mutex<VecDeque<Metric>>,
}

/// Running timer; records itself when finished or dropped.
pub struct Timer<'a> {
    monitor: &'a PerfMonitor,
    name: &'static str,
    started: Instant,
    done: bool,
}

impl Timer<'_> {
    #[allow(dead_code)]
    pub fn finish(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        self.done = true;
        let elapsed = self.started.elapsed();
        self.monitor.record(self.name, elapsed);
        elapsed
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.record();
        }
    }
}

impl PerfMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, name: &'static str) -> Timer<'_> {
        Timer {
            monitor: self,
            name,
            started: Instant::now(),
            done: false,
        }
    }

    pub fn record(&self, name: &str, elapsed: Duration) {
        debug!("{} took {:?}", name, elapsed);
        let mut metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        if metrics.len() == MAX_METRICS {
            metrics.pop_front();
        }
        metrics.push_back(Metric {
            name: name.to_string(),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
        });
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Per-name count, average and max, sorted by name.
    pub fn summary(&self) -> Vec<MetricSummary> {
        let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for m in self.metrics() {
            grouped.entry(m.name).or_default().push(m.duration_ms);
        }

        grouped
            .into_iter()
            .map(|(name, samples)| MetricSummary {
                count: samples.len(),
                average_ms: samples.iter().sum::<f64>() / samples.len() as f64,
                max_ms: samples.iter().copied().fold(0.0, f64::max),
                name,
            })
            .collect()
    }

    pub fn report(&self) -> String {
        let summary = self.summary();
        if summary.is_empty() {
            return "No timings recorded".to_string();
        }

        summary
            .iter()
            .map(|s| {
                format!(
                    "{:<24} {:>4} calls  avg {:>8.1} ms  max {:>8.1} ms",
                    s.name, s.count, s.average_ms, s.max_ms
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
