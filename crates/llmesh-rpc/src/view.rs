//! The cluster as the RPC services see it.
//!
//! ```text
//!   Membership::nodes()  ──┐
//!                          ├──▶ ClusterView::nodes()  (gossip wins on id)
//!   Broadcaster::nodes() ──┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use llmesh_agent::Broadcaster;
use llmesh_core::{Node, NodeStatus, epoch_secs};
use llmesh_gossip::Membership;

use crate::proto;

/// Cluster id reported by every join and info response.
pub const CLUSTER_ID: &str = "distributed-llm-cluster";

/// Shared read-side over membership and the local broadcaster. Cheap to
/// clone.
#[derive(Clone)]
pub struct ClusterView {
    membership: Arc<dyn Membership>,
    broadcaster: Broadcaster,
    started: Instant,
}

impl ClusterView {
    pub fn new(membership: Arc<dyn Membership>, broadcaster: Broadcaster) -> Self {
        Self {
            membership,
            broadcaster,
            started: Instant::now(),
        }
    }

    pub fn local_id(&self) -> &str {
        self.membership.local_id()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Every known node. Broadcaster-registered nodes are appended only
    /// when gossip does not already know their id.
    pub async fn nodes(&self) -> Vec<Node> {
        let mut nodes = self.membership.nodes();
        let known: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
        nodes.extend(
            self.broadcaster
                .nodes()
                .await
                .into_iter()
                .filter(|n| !known.contains(&n.id)),
        );
        nodes
    }

    /// Every known node except this one.
    pub async fn peers(&self) -> Vec<Node> {
        let local = self.local_id().to_string();
        self.nodes()
            .await
            .into_iter()
            .filter(|n| n.id != local)
            .collect()
    }

    /// Status this node advertises through membership; `Online` when
    /// membership is not running.
    pub fn local_status(&self) -> NodeStatus {
        let local = self.local_id();
        self.membership
            .members()
            .into_iter()
            .find(|m| m.name == local)
            .map(|m| m.to_node().status)
            .unwrap_or(NodeStatus::Online)
    }

    /// Point-in-time metrics of this node.
    pub async fn node_metrics(&self) -> proto::NodeMetrics {
        let resources = self.broadcaster.resources().await;
        let peer_count = self.peers().await.len();
        proto::NodeMetrics {
            node_id: self.local_id().to_string(),
            timestamp: epoch_secs() as i64,
            status: self.local_status().as_str().to_string(),
            cpu_cores: resources.cpu_cores,
            memory_mb: resources.memory_mb,
            total_memory_mb: resources.total_memory_mb(),
            gpu_count: resources.gpus.len() as i32,
            max_layers: resources.max_layers,
            used_layers: resources.used_layers,
            available_layers: resources.available_layers(),
            peer_count: i32::try_from(peer_count).unwrap_or(i32::MAX),
            uptime_seconds: self.uptime().as_secs() as i64,
        }
    }
}

/// Aggregate capacity over `nodes`.
///
/// Only `Online` nodes count as healthy. Available memory equals total
/// memory because nodes do not report usage.
pub fn cluster_metrics(nodes: &[Node]) -> proto::ClusterMetrics {
    let mut healthy: i64 = 0;
    let mut memory_mb: i64 = 0;
    let mut gpus: i64 = 0;
    let mut total_layers: i64 = 0;
    let mut allocated_layers: i64 = 0;
    for node in nodes {
        if node.status == NodeStatus::Online {
            healthy += 1;
        }
        memory_mb = memory_mb.saturating_add(node.resources.memory_mb);
        gpus += node.resources.gpus.len() as i64;
        total_layers += i64::from(node.resources.max_layers);
        allocated_layers += i64::from(node.resources.used_layers);
    }

    let utilization = if total_layers > 0 {
        (allocated_layers as f64 / total_layers as f64 * 100.0) as f32
    } else {
        0.0
    };
    proto::ClusterMetrics {
        total_nodes: clamp_i32(nodes.len() as i64),
        healthy_nodes: clamp_i32(healthy),
        total_memory_mb: memory_mb,
        available_memory_mb: memory_mb,
        total_gpus: clamp_i32(gpus),
        total_layers: clamp_i32(total_layers),
        allocated_layers: clamp_i32(allocated_layers),
        cluster_utilization: utilization,
    }
}

fn clamp_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}
