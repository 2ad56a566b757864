//! Conversions between the core data model and wire messages.
//!
//! Wire integers are wider or signed where the core types are not; values
//! that cannot be represented are clamped rather than rejected, since they
//! describe remote state.

use llmesh_core::{GpuInfo, Model, Node, NodeStatus, ResourceInfo};

use crate::proto;

impl From<&GpuInfo> for proto::GpuInfo {
    fn from(g: &GpuInfo) -> Self {
        Self {
            name: g.name.clone(),
            memory_mb: g.memory_mb,
            uuid: g.uuid.clone(),
        }
    }
}

impl From<proto::GpuInfo> for GpuInfo {
    fn from(g: proto::GpuInfo) -> Self {
        Self {
            name: g.name,
            memory_mb: g.memory_mb,
            uuid: g.uuid,
        }
    }
}

impl From<&ResourceInfo> for proto::ResourceInfo {
    fn from(r: &ResourceInfo) -> Self {
        Self {
            cpu_cores: r.cpu_cores,
            memory_mb: r.memory_mb,
            gpus: r.gpus.iter().map(Into::into).collect(),
            max_layers: r.max_layers,
            used_layers: r.used_layers,
        }
    }
}

impl From<proto::ResourceInfo> for ResourceInfo {
    fn from(r: proto::ResourceInfo) -> Self {
        Self {
            cpu_cores: r.cpu_cores,
            memory_mb: r.memory_mb,
            gpus: r.gpus.into_iter().map(Into::into).collect(),
            max_layers: r.max_layers,
            used_layers: r.used_layers,
        }
    }
}

impl From<&Node> for proto::NodeInfo {
    fn from(n: &Node) -> Self {
        Self {
            node_id: n.id.clone(),
            address: n.address.clone(),
            port: i32::from(n.port),
            resources: Some((&n.resources).into()),
            status: n.status.as_str().to_string(),
            last_seen: i64::try_from(n.last_seen).unwrap_or(i64::MAX),
        }
    }
}

impl From<proto::NodeInfo> for Node {
    fn from(n: proto::NodeInfo) -> Self {
        Self {
            id: n.node_id,
            address: n.address,
            port: u16::try_from(n.port).unwrap_or(0),
            resources: n.resources.map(Into::into).unwrap_or_default(),
            status: NodeStatus::from_wire(&n.status),
            last_seen: u64::try_from(n.last_seen).unwrap_or(0),
        }
    }
}

impl From<&Model> for proto::ModelInfo {
    fn from(m: &Model) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            version: m.version.clone(),
            layer_count: m.layer_count,
            file_path: m.file_path.clone(),
            size_bytes: m.size,
            node_assignments: Vec::new(),
        }
    }
}

impl From<proto::ModelInfo> for Model {
    fn from(m: proto::ModelInfo) -> Self {
        Self {
            id: m.id,
            name: m.name,
            version: m.version,
            layer_count: m.layer_count,
            file_path: m.file_path,
            size: m.size_bytes,
        }
    }
}
