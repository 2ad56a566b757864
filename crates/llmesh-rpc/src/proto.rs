//! Messages of package `llmesh`, declared with prost derives.

// ── Shared types ───────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GpuInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, tag = "2")]
    pub memory_mb: i64,
    #[prost(string, tag = "3")]
    pub uuid: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceInfo {
    #[prost(int64, tag = "1")]
    pub cpu_cores: i64,
    #[prost(int64, tag = "2")]
    pub memory_mb: i64,
    #[prost(message, repeated, tag = "3")]
    pub gpus: Vec<GpuInfo>,
    #[prost(int32, tag = "4")]
    pub max_layers: i32,
    #[prost(int32, tag = "5")]
    pub used_layers: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInfo {
    #[prost(string, tag = "1")]
    pub node_id: String,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(int32, tag = "3")]
    pub port: i32,
    #[prost(message, optional, tag = "4")]
    pub resources: Option<ResourceInfo>,
    /// `online`, `offline`, or `busy`.
    #[prost(string, tag = "5")]
    pub status: String,
    /// Unix seconds.
    #[prost(int64, tag = "6")]
    pub last_seen: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInfo {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub version: String,
    #[prost(int32, tag = "4")]
    pub layer_count: i32,
    #[prost(string, tag = "5")]
    pub file_path: String,
    #[prost(int64, tag = "6")]
    pub size_bytes: i64,
    #[prost(string, repeated, tag = "7")]
    pub node_assignments: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterMetrics {
    #[prost(int32, tag = "1")]
    pub total_nodes: i32,
    #[prost(int32, tag = "2")]
    pub healthy_nodes: i32,
    #[prost(int64, tag = "3")]
    pub total_memory_mb: i64,
    #[prost(int64, tag = "4")]
    pub available_memory_mb: i64,
    #[prost(int32, tag = "5")]
    pub total_gpus: i32,
    #[prost(int32, tag = "6")]
    pub total_layers: i32,
    #[prost(int32, tag = "7")]
    pub allocated_layers: i32,
    /// Percent of layer capacity allocated.
    #[prost(float, tag = "8")]
    pub cluster_utilization: f32,
}

/// Point-in-time metrics of one node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeMetrics {
    #[prost(string, tag = "1")]
    pub node_id: String,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    #[prost(string, tag = "3")]
    pub status: String,
    #[prost(int64, tag = "4")]
    pub cpu_cores: i64,
    #[prost(int64, tag = "5")]
    pub memory_mb: i64,
    #[prost(int64, tag = "6")]
    pub total_memory_mb: i64,
    #[prost(int32, tag = "7")]
    pub gpu_count: i32,
    #[prost(int32, tag = "8")]
    pub max_layers: i32,
    #[prost(int32, tag = "9")]
    pub used_layers: i32,
    #[prost(int32, tag = "10")]
    pub available_layers: i32,
    #[prost(int32, tag = "11")]
    pub peer_count: i32,
    #[prost(int64, tag = "12")]
    pub uptime_seconds: i64,
}

// ── NodeService ────────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterNodeRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(int32, tag = "3")]
    pub port: i32,
    #[prost(message, optional, tag = "4")]
    pub resources: Option<ResourceInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterNodeResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResourcesRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResourcesResponse {
    #[prost(message, optional, tag = "1")]
    pub resources: Option<ResourceInfo>,
    #[prost(int32, tag = "2")]
    pub available_layers: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferenceRequest {
    #[prost(string, tag = "1")]
    pub request_id: String,
    #[prost(string, tag = "2")]
    pub model_id: String,
    #[prost(string, tag = "3")]
    pub prompt: String,
    #[prost(int32, tag = "4")]
    pub max_tokens: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InferenceResponse {
    #[prost(string, tag = "1")]
    pub request_id: String,
    #[prost(string, tag = "2")]
    pub generated_text: String,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(string, tag = "4")]
    pub error: String,
    #[prost(int32, tag = "5")]
    pub tokens_generated: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
    #[prost(bool, tag = "1")]
    pub healthy: bool,
    #[prost(string, tag = "2")]
    pub status: String,
    #[prost(int64, tag = "3")]
    pub uptime_seconds: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPeersRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPeersResponse {
    #[prost(message, repeated, tag = "1")]
    pub peers: Vec<NodeInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMetricsRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMetricsResponse {
    #[prost(message, optional, tag = "1")]
    pub metrics: Option<NodeMetrics>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamMetricsRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
    /// Push period; values below one second are raised to one second.
    #[prost(int32, tag = "2")]
    pub interval_seconds: i32,
}

// ── DiscoveryService ───────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiscoveryRequest {
    #[prost(string, tag = "1")]
    pub requester_id: String,
    /// Node ids the caller already knows about.
    #[prost(string, repeated, tag = "2")]
    pub known_nodes: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiscoveryResponse {
    #[prost(message, repeated, tag = "1")]
    pub discovered_nodes: Vec<NodeInfo>,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterJoinRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
    #[prost(string, tag = "2")]
    pub address: String,
    #[prost(int32, tag = "3")]
    pub port: i32,
    #[prost(message, optional, tag = "4")]
    pub resources: Option<ResourceInfo>,
    #[prost(string, repeated, tag = "5")]
    pub seed_nodes: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterJoinResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub existing_nodes: Vec<NodeInfo>,
    #[prost(string, tag = "4")]
    pub cluster_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterLeaveRequest {
    #[prost(string, tag = "1")]
    pub node_id: String,
    #[prost(string, tag = "2")]
    pub reason: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterLeaveResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterInfoRequest {
    #[prost(string, tag = "1")]
    pub requester_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterInfoResponse {
    #[prost(string, tag = "1")]
    pub cluster_id: String,
    #[prost(message, repeated, tag = "2")]
    pub nodes: Vec<NodeInfo>,
    #[prost(message, repeated, tag = "3")]
    pub models: Vec<ModelInfo>,
    #[prost(message, optional, tag = "4")]
    pub metrics: Option<ClusterMetrics>,
}

// ── ConsoleService ─────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeListRequest {
    #[prost(string, tag = "1")]
    pub requester_id: String,
    #[prost(bool, tag = "2")]
    pub include_metrics: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeListResponse {
    #[prost(message, repeated, tag = "1")]
    pub nodes: Vec<NodeInfo>,
    #[prost(message, optional, tag = "2")]
    pub cluster_metrics: Option<ClusterMetrics>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelListRequest {
    #[prost(string, tag = "1")]
    pub requester_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelListResponse {
    #[prost(message, repeated, tag = "1")]
    pub models: Vec<ModelInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateStreamRequest {
    #[prost(string, tag = "1")]
    pub requester_id: String,
    /// Any of `nodes`, `models`, `metrics`; empty means all three.
    #[prost(string, repeated, tag = "2")]
    pub update_types: Vec<String>,
    #[prost(int32, tag = "3")]
    pub interval_seconds: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClusterUpdate {
    #[prost(string, tag = "1")]
    pub update_type: String,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    #[prost(message, repeated, tag = "3")]
    pub nodes: Vec<NodeInfo>,
    #[prost(message, repeated, tag = "4")]
    pub models: Vec<ModelInfo>,
    #[prost(message, optional, tag = "5")]
    pub metrics: Option<ClusterMetrics>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandRequest {
    #[prost(string, tag = "1")]
    pub requester_id: String,
    #[prost(string, tag = "2")]
    pub command: String,
    #[prost(string, repeated, tag = "3")]
    pub args: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub output: String,
    #[prost(string, tag = "3")]
    pub error: String,
    #[prost(int32, tag = "4")]
    pub exit_code: i32,
}

// ── Generated stubs ────────────────────────────────────────────

include!(concat!(env!("OUT_DIR"), "/llmesh.NodeService.rs"));
include!(concat!(env!("OUT_DIR"), "/llmesh.DiscoveryService.rs"));
include!(concat!(env!("OUT_DIR"), "/llmesh.ConsoleService.rs"));
