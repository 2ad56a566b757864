//! Domain types shared by every llmesh crate.
//!
//! These are plain value types: peers are always handed around as copies,
//! never as references into membership or discovery internals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// A node is considered stale once it has not been seen for this long.
pub const HEALTHY_WINDOW_SECS: u64 = 5 * 60;

// ── Node ───────────────────────────────────────────────────────────

/// Liveness state of a cluster participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Online,
    Offline,
    Busy,
}

impl NodeStatus {
    /// Wire representation used by the RPC layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
            NodeStatus::Busy => "busy",
        }
    }

    /// Parse a wire status string. Unknown values decode as `Offline`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "online" => NodeStatus::Online,
            "busy" => NodeStatus::Busy,
            _ => NodeStatus::Offline,
        }
    }

    /// Numeric gauge value: 0=offline, 1=online, 2=busy.
    pub fn gauge_value(&self) -> u64 {
        match self {
            NodeStatus::Offline => 0,
            NodeStatus::Online => 1,
            NodeStatus::Busy => 2,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cluster participant as seen by membership or discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Node {
    pub id: NodeId,
    pub address: String,
    pub port: u16,
    pub resources: ResourceInfo,
    pub status: NodeStatus,
    /// Unix timestamp (seconds) of the last observation.
    pub last_seen: u64,
}

impl Node {
    /// Online and observed within the last five minutes.
    pub fn is_healthy(&self) -> bool {
        self.is_healthy_at(epoch_secs())
    }

    /// Health check against an explicit clock.
    pub fn is_healthy_at(&self, now: u64) -> bool {
        self.status == NodeStatus::Online
            && now.saturating_sub(self.last_seen) < HEALTHY_WINDOW_SECS
    }

    /// `host:port` endpoint for this node.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// ── Resources ──────────────────────────────────────────────────────

/// Compute capacity advertised by a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceInfo {
    pub cpu_cores: i64,
    pub memory_mb: i64,
    pub gpus: Vec<GpuInfo>,
    /// Workload units (model layers) this node can host.
    pub max_layers: i32,
    /// Workload units currently allocated.
    pub used_layers: i32,
}

impl ResourceInfo {
    /// System memory plus the memory of every GPU.
    pub fn total_memory_mb(&self) -> i64 {
        self.memory_mb + self.gpus.iter().map(|g| g.memory_mb).sum::<i64>()
    }

    pub fn has_gpus(&self) -> bool {
        !self.gpus.is_empty()
    }

    /// Unallocated layer capacity, never negative.
    pub fn available_layers(&self) -> i32 {
        self.max_layers.saturating_sub(self.used_layers).max(0)
    }

    /// Check the `used_layers <= max_layers` capacity invariant.
    pub fn validate(&self) -> Result<(), crate::CoreError> {
        if self.max_layers < 0 || self.used_layers < 0 {
            return Err(crate::CoreError::Validation(format!(
                "layer counts must be non-negative (max={}, used={})",
                self.max_layers, self.used_layers
            )));
        }
        if self.used_layers > self.max_layers {
            return Err(crate::CoreError::Validation(format!(
                "used layers {} exceed capacity {}",
                self.used_layers, self.max_layers
            )));
        }
        Ok(())
    }
}

/// A single accelerator attached to a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GpuInfo {
    pub name: String,
    pub memory_mb: i64,
    pub uuid: String,
}

// ── Models ─────────────────────────────────────────────────────────

/// Workload descriptor for a model that can be split across nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub version: String,
    pub layer_count: i32,
    pub file_path: String,
    /// Size in bytes.
    pub size: i64,
}

impl Model {
    pub fn size_in_gb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// Aggregate cluster snapshot, produced on demand and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClusterState {
    pub nodes: Vec<Node>,
    pub models: Vec<Model>,
}

impl ClusterState {
    pub fn healthy_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_healthy())
    }
}

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(status: NodeStatus, last_seen: u64) -> Node {
        Node {
            id: "node-1".to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            resources: ResourceInfo::default(),
            status,
            last_seen,
        }
    }

    #[test]
    fn online_and_recent_is_healthy() {
        let now = 1_000_000;
        assert!(node(NodeStatus::Online, now - 60).is_healthy_at(now));
    }

    #[test]
    fn stale_node_is_never_healthy() {
        let now = 1_000_000;
        for status in [NodeStatus::Online, NodeStatus::Offline, NodeStatus::Busy] {
            assert!(!node(status, now - 600).is_healthy_at(now));
        }
    }

    #[test]
    fn health_window_boundary() {
        let now = 1_000_000;
        assert!(node(NodeStatus::Online, now - HEALTHY_WINDOW_SECS + 1).is_healthy_at(now));
        assert!(!node(NodeStatus::Online, now - HEALTHY_WINDOW_SECS).is_healthy_at(now));
    }

    #[test]
    fn busy_and_offline_are_unhealthy() {
        let now = 1_000_000;
        assert!(!node(NodeStatus::Busy, now).is_healthy_at(now));
        assert!(!node(NodeStatus::Offline, now).is_healthy_at(now));
    }

    #[test]
    fn fresh_node_is_healthy_with_wall_clock() {
        assert!(node(NodeStatus::Online, epoch_secs()).is_healthy());
    }

    #[test]
    fn total_memory_includes_gpus() {
        let info = ResourceInfo {
            cpu_cores: 8,
            memory_mb: 16_384,
            gpus: vec![
                GpuInfo {
                    name: "A100".to_string(),
                    memory_mb: 40_960,
                    uuid: "gpu-0".to_string(),
                },
                GpuInfo {
                    name: "A100".to_string(),
                    memory_mb: 40_960,
                    uuid: "gpu-1".to_string(),
                },
            ],
            max_layers: 32,
            used_layers: 8,
        };
        assert_eq!(info.total_memory_mb(), 16_384 + 2 * 40_960);
        assert!(info.has_gpus());
        assert_eq!(info.available_layers(), 24);
    }

    #[test]
    fn no_gpus() {
        let info = ResourceInfo {
            memory_mb: 4096,
            ..Default::default()
        };
        assert!(!info.has_gpus());
        assert_eq!(info.total_memory_mb(), 4096);
    }

    #[test]
    fn layer_invariant() {
        let ok = ResourceInfo {
            max_layers: 10,
            used_layers: 10,
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let over = ResourceInfo {
            max_layers: 10,
            used_layers: 11,
            ..Default::default()
        };
        assert!(over.validate().is_err());
        assert_eq!(over.available_layers(), 0);

        let negative = ResourceInfo {
            max_layers: i32::MAX,
            used_layers: -1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
        assert_eq!(negative.available_layers(), i32::MAX);
    }

    #[test]
    fn model_size_in_gb() {
        let model = Model {
            size: 2 * 1024 * 1024 * 1024,
            ..Default::default()
        };
        assert!((model.size_in_gb() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn status_wire_strings() {
        assert_eq!(NodeStatus::from_wire("online"), NodeStatus::Online);
        assert_eq!(NodeStatus::from_wire("busy"), NodeStatus::Busy);
        assert_eq!(NodeStatus::from_wire("offline"), NodeStatus::Offline);
        assert_eq!(NodeStatus::from_wire("weird"), NodeStatus::Offline);
        assert_eq!(NodeStatus::Busy.to_string(), "busy");
    }

    #[test]
    fn serde_uses_snake_case_status() {
        let json = serde_json::to_string(&node(NodeStatus::Online, 5)).unwrap();
        assert!(json.contains("\"status\":\"online\""));
    }
}
