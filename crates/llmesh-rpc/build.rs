//! Generates tonic client/server stubs for the three llmesh services.
//!
//! Messages are declared by hand in `src/proto.rs` with prost derives, so
//! no `protoc` is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path(CODEC)
        .build()
}

fn server_stream(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path(CODEC)
        .server_streaming()
        .build()
}

fn main() {
    let node = Service::builder()
        .name("NodeService")
        .package("llmesh")
        .method(unary("register_node", "RegisterNode", "RegisterNodeRequest", "RegisterNodeResponse"))
        .method(unary("get_resources", "GetResources", "GetResourcesRequest", "GetResourcesResponse"))
        .method(unary("process_inference", "ProcessInference", "InferenceRequest", "InferenceResponse"))
        .method(unary("health_check", "HealthCheck", "HealthCheckRequest", "HealthCheckResponse"))
        .method(unary("get_peers", "GetPeers", "GetPeersRequest", "GetPeersResponse"))
        .method(unary("get_metrics", "GetMetrics", "GetMetricsRequest", "GetMetricsResponse"))
        .method(server_stream("stream_metrics", "StreamMetrics", "StreamMetricsRequest", "NodeMetrics"))
        .build();

    let discovery = Service::builder()
        .name("DiscoveryService")
        .package("llmesh")
        .method(unary("discover_nodes", "DiscoverNodes", "DiscoveryRequest", "DiscoveryResponse"))
        .method(unary("register_with_cluster", "RegisterWithCluster", "ClusterJoinRequest", "ClusterJoinResponse"))
        .method(unary("leave_cluster", "LeaveCluster", "ClusterLeaveRequest", "ClusterLeaveResponse"))
        .method(unary("get_cluster_info", "GetClusterInfo", "ClusterInfoRequest", "ClusterInfoResponse"))
        .build();

    let console = Service::builder()
        .name("ConsoleService")
        .package("llmesh")
        .method(unary("get_node_list", "GetNodeList", "NodeListRequest", "NodeListResponse"))
        .method(unary("get_model_list", "GetModelList", "ModelListRequest", "ModelListResponse"))
        .method(server_stream("stream_updates", "StreamUpdates", "UpdateStreamRequest", "ClusterUpdate"))
        .method(unary("execute_command", "ExecuteCommand", "CommandRequest", "CommandResponse"))
        .build();

    Builder::new().compile(&[node, discovery, console]);
    println!("cargo:rerun-if-changed=build.rs");
}
