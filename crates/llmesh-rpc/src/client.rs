//! Typed client over all three services of one agent.

use std::time::Duration;

use tonic::codec::{CompressionEncoding, Streaming};
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use llmesh_core::{Model, Node, ResourceInfo};

use crate::error::{RpcError, RpcResult};
use crate::proto;
use crate::proto::console_service_client::ConsoleServiceClient;
use crate::proto::discovery_service_client::DiscoveryServiceClient;
use crate::proto::node_service_client::NodeServiceClient;

/// Bound on establishing the connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Deadline for each unary call.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_REQUESTER: &str = "llmesh-console";

/// Connection to one agent. Cloning shares the underlying channel.
#[derive(Clone)]
pub struct AgentClient {
    address: String,
    requester_id: String,
    node: NodeServiceClient<Channel>,
    discovery: DiscoveryServiceClient<Channel>,
    console: ConsoleServiceClient<Channel>,
}

impl AgentClient {
    /// Connect to `address` (`host:port`, or a full `http://` URI).
    pub async fn connect(address: &str) -> RpcResult<Self> {
        let uri = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let endpoint = Endpoint::from_shared(uri)
            .map_err(|source| RpcError::InvalidEndpoint {
                endpoint: address.to_string(),
                source,
            })?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CALL_TIMEOUT);

        let channel = endpoint.connect().await.map_err(|source| RpcError::Connect {
            endpoint: address.to_string(),
            source,
        })?;
        debug!(%address, "connected to agent");
        Ok(Self::from_channel(address, channel))
    }

    /// Wrap an existing channel.
    pub fn from_channel(address: &str, channel: Channel) -> Self {
        Self {
            address: address.to_string(),
            requester_id: DEFAULT_REQUESTER.to_string(),
            node: NodeServiceClient::new(channel.clone())
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip),
            discovery: DiscoveryServiceClient::new(channel.clone())
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip),
            console: ConsoleServiceClient::new(channel)
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip),
        }
    }

    /// Identity sent as `requester_id` on console and discovery calls.
    pub fn with_requester_id(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = requester_id.into();
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    // ── NodeService ────────────────────────────────────────────

    pub async fn resources(&self) -> RpcResult<ResourceInfo> {
        let resp = self
            .node
            .clone()
            .get_resources(proto::GetResourcesRequest {
                node_id: self.requester_id.clone(),
            })
            .await?
            .into_inner();
        Ok(resp.resources.map(Into::into).unwrap_or_default())
    }

    pub async fn health_check(&self) -> RpcResult<proto::HealthCheckResponse> {
        Ok(self
            .node
            .clone()
            .health_check(proto::HealthCheckRequest {
                node_id: self.requester_id.clone(),
            })
            .await?
            .into_inner())
    }

    /// Peers of the agent (never the agent itself).
    pub async fn peer_nodes(&self) -> RpcResult<Vec<Node>> {
        let resp = self
            .node
            .clone()
            .get_peers(proto::GetPeersRequest {
                node_id: self.requester_id.clone(),
            })
            .await?
            .into_inner();
        Ok(resp.peers.into_iter().map(Into::into).collect())
    }

    /// Peer RPC endpoints as `host:port`.
    pub async fn peers(&self) -> RpcResult<Vec<String>> {
        Ok(self.peer_nodes().await?.iter().map(Node::endpoint).collect())
    }

    pub async fn node_metrics(&self) -> RpcResult<proto::NodeMetrics> {
        self.node
            .clone()
            .get_metrics(proto::GetMetricsRequest {
                node_id: self.requester_id.clone(),
            })
            .await?
            .into_inner()
            .metrics
            .ok_or(RpcError::MissingField("metrics"))
    }

    pub async fn infer(&self, request: proto::InferenceRequest) -> RpcResult<proto::InferenceResponse> {
        Ok(self.node.clone().process_inference(request).await?.into_inner())
    }

    pub async fn stream_metrics(&self, interval_seconds: i32) -> RpcResult<Streaming<proto::NodeMetrics>> {
        Ok(self
            .node
            .clone()
            .stream_metrics(proto::StreamMetricsRequest {
                node_id: self.requester_id.clone(),
                interval_seconds,
            })
            .await?
            .into_inner())
    }

    // ── DiscoveryService ───────────────────────────────────────

    pub async fn cluster_info(&self) -> RpcResult<proto::ClusterInfoResponse> {
        Ok(self
            .discovery
            .clone()
            .get_cluster_info(proto::ClusterInfoRequest {
                requester_id: self.requester_id.clone(),
            })
            .await?
            .into_inner())
    }

    /// Nodes the agent knows that are not in `known`.
    pub async fn discover(&self, known: Vec<String>) -> RpcResult<Vec<Node>> {
        let resp = self
            .discovery
            .clone()
            .discover_nodes(proto::DiscoveryRequest {
                requester_id: self.requester_id.clone(),
                known_nodes: known,
            })
            .await?
            .into_inner();
        Ok(resp.discovered_nodes.into_iter().map(Into::into).collect())
    }

    // ── ConsoleService ─────────────────────────────────────────

    /// Every node the agent knows, including itself.
    pub async fn nodes(&self) -> RpcResult<Vec<Node>> {
        let resp = self
            .console
            .clone()
            .get_node_list(proto::NodeListRequest {
                requester_id: self.requester_id.clone(),
                include_metrics: false,
            })
            .await?
            .into_inner();
        Ok(resp.nodes.into_iter().map(Into::into).collect())
    }

    pub async fn models(&self) -> RpcResult<Vec<Model>> {
        let resp = self
            .console
            .clone()
            .get_model_list(proto::ModelListRequest {
                requester_id: self.requester_id.clone(),
            })
            .await?
            .into_inner();
        Ok(resp.models.into_iter().map(Into::into).collect())
    }

    pub async fn execute_command(&self, command: &str, args: Vec<String>) -> RpcResult<proto::CommandResponse> {
        Ok(self
            .console
            .clone()
            .execute_command(proto::CommandRequest {
                requester_id: self.requester_id.clone(),
                command: command.to_string(),
                args,
            })
            .await?
            .into_inner())
    }

    /// Open an update stream. It lives until the returned stream is dropped.
    pub async fn stream_updates(
        &self,
        update_types: Vec<String>,
        interval_seconds: i32,
    ) -> RpcResult<Streaming<proto::ClusterUpdate>> {
        Ok(self
            .console
            .clone()
            .stream_updates(proto::UpdateStreamRequest {
                requester_id: self.requester_id.clone(),
                update_types,
                interval_seconds,
            })
            .await?
            .into_inner())
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("address", &self.address)
            .field("requester_id", &self.requester_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_closed_port_fails_fast() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let started = std::time::Instant::now();
        let err = AgentClient::connect(&addr.to_string()).await.unwrap_err();
        assert!(matches!(err, RpcError::Connect { .. }));
        assert!(started.elapsed() < CONNECT_TIMEOUT + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn malformed_address_is_rejected() {
        let err = AgentClient::connect("not a uri\n").await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidEndpoint { .. }));
    }
}
