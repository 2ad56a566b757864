//! Resource broadcaster — owns the local resource snapshot and fans it out.
//!
//! Delivery to subscribers is at-most-once per tick: every push uses
//! `try_send`, so a full channel loses that update for that subscriber and
//! a closed channel is dropped from the list. Nothing here ever waits on a
//! slow subscriber.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use llmesh_core::{Node, ResourceInfo};
use llmesh_metrics::{INCOMING, MetricsHandle, OUTGOING};

use crate::error::{AgentError, AgentResult};

/// Default re-announce period.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(30);

struct Inner {
    resources: ResourceInfo,
    nodes: Vec<Node>,
    subscribers: Vec<mpsc::Sender<ResourceInfo>>,
}

/// Holds the authoritative local [`ResourceInfo`]. Cheap to clone; clones
/// share state.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<RwLock<Inner>>,
    interval: Duration,
    metrics: MetricsHandle,
}

impl Broadcaster {
    pub fn new(resources: ResourceInfo) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                resources,
                nodes: Vec::new(),
                subscribers: Vec::new(),
            })),
            interval: BROADCAST_INTERVAL,
            metrics: MetricsHandle::disabled(),
        }
    }

    /// Set the broadcast tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current snapshot (a copy).
    pub async fn resources(&self) -> ResourceInfo {
        self.inner.read().await.resources.clone()
    }

    /// Replace the snapshot and push it to every subscriber immediately.
    ///
    /// Rejects negative layer counts or more used than available layers,
    /// leaving the current snapshot untouched.
    pub async fn update_resources(&self, resources: ResourceInfo) -> AgentResult<()> {
        if resources.max_layers >= 0 && resources.used_layers > resources.max_layers {
            return Err(AgentError::LayerOvercommit {
                used: resources.used_layers,
                max: resources.max_layers,
            });
        }
        resources.validate()?;

        let subscribers = {
            let mut inner = self.inner.write().await;
            inner.resources = resources.clone();
            inner.subscribers.clone()
        };

        self.metrics.update_node_resources(&resources);
        debug!(
            cpu_cores = resources.cpu_cores,
            memory_mb = resources.memory_mb,
            used_layers = resources.used_layers,
            max_layers = resources.max_layers,
            "resources updated"
        );
        self.fan_out(&subscribers, &resources).await;
        Ok(())
    }

    /// Register a bounded delivery channel.
    pub async fn subscribe(&self, sender: mpsc::Sender<ResourceInfo>) {
        self.inner.write().await.subscribers.push(sender);
    }

    /// Create a channel of the given capacity, subscribe it, and return the
    /// receiving half.
    pub async fn subscribe_channel(&self, capacity: usize) -> mpsc::Receiver<ResourceInfo> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribe(tx).await;
        rx
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.subscribers.len()
    }

    /// Add a node to the broadcaster-local registry.
    pub async fn add_node(&self, node: Node) {
        let count = {
            let mut inner = self.inner.write().await;
            inner.nodes.push(node);
            inner.nodes.len()
        };
        self.metrics.update_connection_count(count);
        self.metrics.record_message(INCOMING, "node_added");
    }

    /// Registered nodes (copies).
    pub async fn nodes(&self) -> Vec<Node> {
        self.inner.read().await.nodes.clone()
    }

    /// Spawn the periodic re-announce loop. The first tick fires one full
    /// interval after start.
    pub fn start(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            info!(interval_secs = this.interval.as_secs_f64(), "resource broadcaster started");
            let start = tokio::time::Instant::now() + this.interval;
            let mut ticker = tokio::time::interval_at(start, this.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => this.broadcast().await,
                    _ = shutdown.changed() => {
                        info!("resource broadcaster shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Push the current snapshot to every subscriber.
    pub async fn broadcast(&self) {
        let (subscribers, resources) = {
            let inner = self.inner.read().await;
            (inner.subscribers.clone(), inner.resources.clone())
        };
        self.metrics.record_message(OUTGOING, "resource_broadcast");
        self.fan_out(&subscribers, &resources).await;
    }

    async fn fan_out(&self, subscribers: &[mpsc::Sender<ResourceInfo>], resources: &ResourceInfo) {
        let mut closed = 0usize;
        for tx in subscribers {
            match tx.try_send(resources.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("subscriber channel full; update dropped"),
                Err(TrySendError::Closed(_)) => closed += 1,
            }
        }
        if closed > 0 {
            let mut inner = self.inner.write().await;
            inner.subscribers.retain(|tx| !tx.is_closed());
            debug!(pruned = closed, remaining = inner.subscribers.len(), "pruned closed subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmesh_core::{GpuInfo, NodeStatus};
    use llmesh_metrics::MetricsCollector;

    fn test_resources(used_layers: i32) -> ResourceInfo {
        ResourceInfo {
            cpu_cores: 8,
            memory_mb: 16384,
            gpus: vec![GpuInfo {
                name: "RTX 4090".into(),
                memory_mb: 24576,
                uuid: "gpu-0".into(),
            }],
            max_layers: 20,
            used_layers,
        }
    }

    fn test_node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            address: "10.0.0.1".into(),
            port: 8080,
            status: NodeStatus::Online,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn update_pushes_to_subscribers() {
        let broadcaster = Broadcaster::new(ResourceInfo::default());
        let mut rx1 = broadcaster.subscribe_channel(4).await;
        let mut rx2 = broadcaster.subscribe_channel(4).await;

        broadcaster.update_resources(test_resources(5)).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().used_layers, 5);
        assert_eq!(rx2.recv().await.unwrap().used_layers, 5);
        assert_eq!(broadcaster.resources().await, test_resources(5));
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let broadcaster = Broadcaster::new(ResourceInfo::default());
        let mut rx = broadcaster.subscribe_channel(1).await;

        broadcaster.update_resources(test_resources(1)).await.unwrap();
        // Channel is now full; these must return immediately and succeed.
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            broadcaster.update_resources(test_resources(2)),
        )
        .await;
        assert!(matches!(second, Ok(Ok(()))));
        broadcaster.update_resources(test_resources(3)).await.unwrap();

        // Only the first update was delivered; later ones were dropped.
        assert_eq!(rx.recv().await.unwrap().used_layers, 1);
        assert!(rx.try_recv().is_err());
        // The snapshot itself always reflects the latest update.
        assert_eq!(broadcaster.resources().await.used_layers, 3);
    }

    #[tokio::test]
    async fn closed_subscribers_are_pruned() {
        let broadcaster = Broadcaster::new(ResourceInfo::default());
        let rx = broadcaster.subscribe_channel(1).await;
        let _kept = broadcaster.subscribe_channel(1).await;
        drop(rx);

        broadcaster.update_resources(test_resources(0)).await.unwrap();
        assert_eq!(broadcaster.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn overcommit_is_rejected() {
        let broadcaster = Broadcaster::new(test_resources(2));
        let mut rx = broadcaster.subscribe_channel(1).await;

        let err = broadcaster.update_resources(test_resources(21)).await.unwrap_err();
        assert!(matches!(err, AgentError::LayerOvercommit { used: 21, max: 20 }));
        assert_eq!(broadcaster.resources().await.used_layers, 2);
        assert!(rx.try_recv().is_err());

        // Exactly at capacity is fine.
        broadcaster.update_resources(test_resources(20)).await.unwrap();
    }

    #[tokio::test]
    async fn negative_layer_counts_are_rejected() {
        let broadcaster = Broadcaster::new(test_resources(2));

        let err = broadcaster
            .update_resources(ResourceInfo {
                max_layers: i32::MAX,
                used_layers: -1,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidResources(_)));

        let err = broadcaster
            .update_resources(ResourceInfo {
                max_layers: -5,
                used_layers: 0,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidResources(_)));

        let current = broadcaster.resources().await;
        assert_eq!(current.used_layers, 2);
        assert_eq!(current.available_layers(), 18);
    }

    #[tokio::test]
    async fn nodes_are_copies() {
        let broadcaster = Broadcaster::new(ResourceInfo::default());
        broadcaster.add_node(test_node("a")).await;
        broadcaster.add_node(test_node("b")).await;

        let mut nodes = broadcaster.nodes().await;
        nodes[0].id = "mutated".into();
        nodes.clear();

        let fresh = broadcaster.nodes().await;
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].id, "a");
    }

    #[tokio::test]
    async fn ticks_until_shutdown() {
        let broadcaster = Broadcaster::new(test_resources(4)).with_interval(Duration::from_millis(20));
        let mut rx = broadcaster.subscribe_channel(16).await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = broadcaster.start(shutdown_rx);
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(first.unwrap().used_layers, 4);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("broadcast loop should exit")
            .unwrap();
    }

    #[tokio::test]
    async fn reports_to_metrics() {
        let collector = Arc::new(MetricsCollector::new("node-1"));
        let broadcaster = Broadcaster::new(ResourceInfo::default())
            .with_metrics(MetricsHandle::new(collector.clone()));

        broadcaster.update_resources(test_resources(5)).await.unwrap();
        broadcaster.broadcast().await;
        broadcaster.add_node(test_node("a")).await;

        let snap = collector.snapshot();
        assert_eq!(snap.used_layers, 5);
        assert_eq!(snap.gpu_count, 1);
        assert_eq!(snap.connections, 1);
        assert_eq!(collector.message_count("outgoing", "resource_broadcast"), 1);
        assert_eq!(collector.message_count("incoming", "node_added"), 1);
    }

    #[tokio::test]
    async fn works_without_metrics() {
        let broadcaster = Broadcaster::new(ResourceInfo::default());
        broadcaster.update_resources(test_resources(1)).await.unwrap();
        broadcaster.broadcast().await;
        broadcaster.add_node(test_node("a")).await;
        assert_eq!(broadcaster.nodes().await.len(), 1);
    }
}
