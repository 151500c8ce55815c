use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use extract::{DegradeKind, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Analyze,
    Expand,
}

pub struct Metrics {
    // Counters
    analyze_requests: AtomicUsize,
    expand_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    degraded: [AtomicUsize; DegradeKind::ALL.len()],

    // Timing (in microseconds)
    total_analyze_time_us: AtomicU64,
    total_expand_time_us: AtomicU64,

    // Counts
    total_nodes: AtomicUsize,
    total_edges: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            analyze_requests: AtomicUsize::new(0),
            expand_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            degraded: Default::default(),
            total_analyze_time_us: AtomicU64::new(0),
            total_expand_time_us: AtomicU64::new(0),
            total_nodes: AtomicUsize::new(0),
            total_edges: AtomicUsize::new(0),
        })
    }

    /// Record a finished pipeline run.
    pub fn record_outcome(&self, endpoint: Endpoint, duration: Duration, outcome: &Outcome) {
        let (requests, time_us) = match endpoint {
            Endpoint::Analyze => (&self.analyze_requests, &self.total_analyze_time_us),
            Endpoint::Expand => (&self.expand_requests, &self.total_expand_time_us),
        };
        requests.fetch_add(1, Ordering::Relaxed);
        time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if let Some(kind) = outcome.degraded {
            self.degraded[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
        }
        self.total_nodes.fetch_add(outcome.graph.nodes.len(), Ordering::Relaxed);
        self.total_edges.fetch_add(outcome.graph.edges.len(), Ordering::Relaxed);
    }

    /// Record a request that escaped the pipeline and became an HTTP 500.
    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let analyze_requests = self.analyze_requests.load(Ordering::Relaxed);
        let expand_requests = self.expand_requests.load(Ordering::Relaxed);

        MetricsSnapshot {
            analyze_requests,
            expand_requests,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            degraded: DegradeKind::ALL
                .iter()
                .map(|kind| {
                    (
                        kind.as_str(),
                        self.degraded[kind_index(*kind)].load(Ordering::Relaxed),
                    )
                })
                .collect(),
            avg_analyze_time_ms: avg_time_ms(&self.total_analyze_time_us, analyze_requests),
            avg_expand_time_ms: avg_time_ms(&self.total_expand_time_us, expand_requests),
            total_nodes: self.total_nodes.load(Ordering::Relaxed),
            total_edges: self.total_edges.load(Ordering::Relaxed),
        }
    }
}

fn kind_index(kind: DegradeKind) -> usize {
    DegradeKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default()
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub analyze_requests: usize,
    pub expand_requests: usize,
    pub failed_requests: usize,
    pub degraded: BTreeMap<&'static str, usize>,
    pub avg_analyze_time_ms: f64,
    pub avg_expand_time_ms: f64,
    pub total_nodes: usize,
    pub total_edges: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
