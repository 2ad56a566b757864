//! In-process metrics collector.
//!
//! Gauges live in atomics; labelled counters and latency samples sit behind
//! short-lived mutexes. Every method is synchronous so it can be called from
//! inside membership merge logic and RPC handlers alike.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use llmesh_core::{NodeStatus, ResourceInfo};

use crate::reporter::MetricsReporter;

/// Latency samples kept per (target, operation) pair.
const MAX_LATENCY_SAMPLES: usize = 1024;

#[derive(Default)]
struct InferenceCounters {
    requests: u64,
    tokens: u64,
    total_us: u64,
}

/// Collects node metrics for Prometheus exposition.
pub struct MetricsCollector {
    node_id: String,
    started: Instant,
    node_status: AtomicU64,
    connections: AtomicU64,
    cpu_cores: AtomicI64,
    memory_mb: AtomicI64,
    gpu_count: AtomicU64,
    max_layers: AtomicI64,
    used_layers: AtomicI64,
    /// (direction, kind) → count.
    messages: Mutex<HashMap<(String, String), u64>>,
    /// (target, operation) → recent latency samples in microseconds.
    latencies: Mutex<HashMap<(String, String), VecDeque<u64>>>,
    /// (model, status) → counters.
    inference: Mutex<HashMap<(String, String), InferenceCounters>>,
}

/// Point-in-time view of everything the collector tracks.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorSnapshot {
    pub node_id: String,
    pub uptime_secs: u64,
    pub node_status: NodeStatus,
    pub connections: u64,
    pub cpu_cores: i64,
    pub memory_mb: i64,
    pub gpu_count: u64,
    pub max_layers: i64,
    pub used_layers: i64,
    pub messages: Vec<MessageCount>,
    pub latencies: Vec<LatencySummary>,
    pub inference: Vec<InferenceSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageCount {
    pub direction: String,
    pub kind: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LatencySummary {
    pub target: String,
    pub operation: String,
    pub samples: usize,
    pub p50_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InferenceSummary {
    pub model_id: String,
    pub status: String,
    pub requests: u64,
    pub tokens: u64,
    pub avg_duration_ms: f64,
}

impl MetricsCollector {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            started: Instant::now(),
            node_status: AtomicU64::new(NodeStatus::Online.gauge_value()),
            connections: AtomicU64::new(0),
            cpu_cores: AtomicI64::new(0),
            memory_mb: AtomicI64::new(0),
            gpu_count: AtomicU64::new(0),
            max_layers: AtomicI64::new(0),
            used_layers: AtomicI64::new(0),
            messages: Mutex::new(HashMap::new()),
            latencies: Mutex::new(HashMap::new()),
            inference: Mutex::new(HashMap::new()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Count of messages recorded for a (direction, kind) pair.
    pub fn message_count(&self, direction: &str, kind: &str) -> u64 {
        lock(&self.messages)
            .get(&(direction.to_string(), kind.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> CollectorSnapshot {
        let mut messages: Vec<MessageCount> = lock(&self.messages)
            .iter()
            .map(|((direction, kind), count)| MessageCount {
                direction: direction.clone(),
                kind: kind.clone(),
                count: *count,
            })
            .collect();
        messages.sort_by(|a, b| (&a.direction, &a.kind).cmp(&(&b.direction, &b.kind)));

        let mut latencies: Vec<LatencySummary> = lock(&self.latencies)
            .iter()
            .map(|((target, operation), samples)| {
                let flat: Vec<u64> = samples.iter().copied().collect();
                let (p50_ms, p99_ms) = compute_percentiles(&flat);
                LatencySummary {
                    target: target.clone(),
                    operation: operation.clone(),
                    samples: flat.len(),
                    p50_ms,
                    p99_ms,
                }
            })
            .collect();
        latencies.sort_by(|a, b| (&a.target, &a.operation).cmp(&(&b.target, &b.operation)));

        let mut inference: Vec<InferenceSummary> = lock(&self.inference)
            .iter()
            .map(|((model_id, status), c)| InferenceSummary {
                model_id: model_id.clone(),
                status: status.clone(),
                requests: c.requests,
                tokens: c.tokens,
                avg_duration_ms: if c.requests > 0 {
                    c.total_us as f64 / c.requests as f64 / 1000.0
                } else {
                    0.0
                },
            })
            .collect();
        inference.sort_by(|a, b| (&a.model_id, &a.status).cmp(&(&b.model_id, &b.status)));

        CollectorSnapshot {
            node_id: self.node_id.clone(),
            uptime_secs: self.started.elapsed().as_secs(),
            node_status: status_from_gauge(self.node_status.load(Ordering::Relaxed)),
            connections: self.connections.load(Ordering::Relaxed),
            cpu_cores: self.cpu_cores.load(Ordering::Relaxed),
            memory_mb: self.memory_mb.load(Ordering::Relaxed),
            gpu_count: self.gpu_count.load(Ordering::Relaxed),
            max_layers: self.max_layers.load(Ordering::Relaxed),
            used_layers: self.used_layers.load(Ordering::Relaxed),
            messages,
            latencies,
            inference,
        }
    }
}

impl MetricsReporter for MetricsCollector {
    fn record_message(&self, direction: &str, kind: &str) {
        *lock(&self.messages)
            .entry((direction.to_string(), kind.to_string()))
            .or_insert(0) += 1;
    }

    fn record_latency(&self, target: &str, operation: &str, duration: Duration) {
        let mut latencies = lock(&self.latencies);
        let samples = latencies
            .entry((target.to_string(), operation.to_string()))
            .or_default();
        if samples.len() >= MAX_LATENCY_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(duration.as_micros() as u64);
    }

    fn update_node_status(&self, status: NodeStatus) {
        self.node_status
            .store(status.gauge_value(), Ordering::Relaxed);
    }

    fn update_connection_count(&self, count: usize) {
        self.connections.store(count as u64, Ordering::Relaxed);
    }

    fn record_inference_request(&self, model_id: &str, status: &str, duration: Duration, tokens: u32) {
        let mut inference = lock(&self.inference);
        let counters = inference
            .entry((model_id.to_string(), status.to_string()))
            .or_default();
        counters.requests += 1;
        counters.tokens += tokens as u64;
        counters.total_us += duration.as_micros() as u64;
        debug!(%model_id, %status, tokens, "inference request recorded");
    }

    fn update_node_resources(&self, resources: &ResourceInfo) {
        self.cpu_cores.store(resources.cpu_cores, Ordering::Relaxed);
        self.memory_mb
            .store(resources.total_memory_mb(), Ordering::Relaxed);
        self.gpu_count
            .store(resources.gpus.len() as u64, Ordering::Relaxed);
        self.max_layers
            .store(resources.max_layers as i64, Ordering::Relaxed);
        self.used_layers
            .store(resources.used_layers as i64, Ordering::Relaxed);
    }
}

/// Compute P50 and P99 latency from unsorted microsecond samples.
///
/// Returns (p50_ms, p99_ms). If empty, returns (0.0, 0.0).
pub fn compute_percentiles(latencies: &[u64]) -> (f64, f64) {
    if latencies.is_empty() {
        return (0.0, 0.0);
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();

    let p50_idx = (sorted.len() as f64 * 0.50) as usize;
    let p99_idx = (sorted.len() as f64 * 0.99) as usize;

    let p50 = sorted[p50_idx.min(sorted.len() - 1)] as f64 / 1000.0;
    let p99 = sorted[p99_idx.min(sorted.len() - 1)] as f64 / 1000.0;

    (p50, p99)
}

fn status_from_gauge(value: u64) -> NodeStatus {
    match value {
        v if v == NodeStatus::Online.gauge_value() => NodeStatus::Online,
        v if v == NodeStatus::Busy.gauge_value() => NodeStatus::Busy,
        _ => NodeStatus::Offline,
    }
}

/// Metrics must keep flowing even if a recording thread panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmesh_core::GpuInfo;

    #[test]
    fn counts_messages_by_direction_and_kind() {
        let collector = MetricsCollector::new("node-1");
        collector.record_message("incoming", "join");
        collector.record_message("incoming", "join");
        collector.record_message("outgoing", "resource_broadcast");

        assert_eq!(collector.message_count("incoming", "join"), 2);
        assert_eq!(collector.message_count("outgoing", "resource_broadcast"), 1);
        assert_eq!(collector.message_count("outgoing", "join"), 0);

        let snap = collector.snapshot();
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(snap.messages[0].direction, "incoming");
    }

    #[test]
    fn latency_samples_are_bounded() {
        let collector = MetricsCollector::new("node-1");
        for i in 0..(MAX_LATENCY_SAMPLES + 10) {
            collector.record_latency("grpc", "GetResources", Duration::from_micros(i as u64));
        }
        let snap = collector.snapshot();
        assert_eq!(snap.latencies.len(), 1);
        assert_eq!(snap.latencies[0].samples, MAX_LATENCY_SAMPLES);
    }

    #[test]
    fn gauges_follow_updates() {
        let collector = MetricsCollector::new("node-1");
        collector.update_node_status(NodeStatus::Busy);
        collector.update_connection_count(4);
        collector.update_node_resources(&ResourceInfo {
            cpu_cores: 8,
            memory_mb: 16384,
            gpus: vec![GpuInfo {
                name: "A100".into(),
                memory_mb: 40960,
                uuid: "gpu-0".into(),
            }],
            max_layers: 20,
            used_layers: 5,
        });

        let snap = collector.snapshot();
        assert_eq!(snap.node_status, NodeStatus::Busy);
        assert_eq!(snap.connections, 4);
        assert_eq!(snap.cpu_cores, 8);
        assert_eq!(snap.memory_mb, 16384 + 40960);
        assert_eq!(snap.gpu_count, 1);
        assert_eq!(snap.used_layers, 5);
    }

    #[test]
    fn inference_averages() {
        let collector = MetricsCollector::new("node-1");
        collector.record_inference_request("llama-7b", "success", Duration::from_millis(10), 10);
        collector.record_inference_request("llama-7b", "success", Duration::from_millis(30), 10);

        let snap = collector.snapshot();
        assert_eq!(snap.inference.len(), 1);
        assert_eq!(snap.inference[0].requests, 2);
        assert_eq!(snap.inference[0].tokens, 20);
        assert!((snap.inference[0].avg_duration_ms - 20.0).abs() < 0.001);
    }

    #[test]
    fn percentiles_empty() {
        assert_eq!(compute_percentiles(&[]), (0.0, 0.0));
    }

    #[test]
    fn percentiles_basic() {
        let latencies: Vec<u64> = (1..=100).map(|i| i * 1000).collect();
        let (p50, p99) = compute_percentiles(&latencies);
        assert!((p50 - 51.0).abs() < 0.001);
        assert!((p99 - 100.0).abs() < 0.001);
    }
}
