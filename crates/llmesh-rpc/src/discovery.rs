//! `DiscoveryService`: who is in the cluster and how much capacity it has.

use std::collections::HashSet;

use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status};
use tracing::info;

use llmesh_metrics::MetricsHandle;

use crate::proto;
use crate::proto::discovery_service_server::{DiscoveryService, DiscoveryServiceServer};
use crate::timer::CallTimer;
use crate::view::{CLUSTER_ID, ClusterView, cluster_metrics};

/// gRPC implementation of the discovery service.
pub struct DiscoveryServer {
    view: ClusterView,
    metrics: MetricsHandle,
}

impl DiscoveryServer {
    pub fn new(view: ClusterView) -> Self {
        Self {
            view,
            metrics: MetricsHandle::disabled(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn into_service(self) -> DiscoveryServiceServer<Self> {
        DiscoveryServiceServer::new(self)
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip)
    }
}

#[tonic::async_trait]
impl DiscoveryService for DiscoveryServer {
    async fn discover_nodes(
        &self,
        request: Request<proto::DiscoveryRequest>,
    ) -> Result<Response<proto::DiscoveryResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "DiscoverNodes");
        let req = request.into_inner();
        let known: HashSet<&str> = req.known_nodes.iter().map(String::as_str).collect();

        let discovered: Vec<proto::NodeInfo> = self
            .view
            .nodes()
            .await
            .iter()
            .filter(|n| !known.contains(n.id.as_str()))
            .map(Into::into)
            .collect();

        Ok(Response::new(proto::DiscoveryResponse {
            message: format!("Discovered {} new nodes", discovered.len()),
            discovered_nodes: discovered,
            success: true,
        }))
    }

    async fn register_with_cluster(
        &self,
        request: Request<proto::ClusterJoinRequest>,
    ) -> Result<Response<proto::ClusterJoinResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "RegisterWithCluster");
        let req = request.into_inner();
        info!(
            node_id = %req.node_id,
            address = %req.address,
            port = req.port,
            seeds = ?req.seed_nodes,
            "cluster join request"
        );

        let nodes = self.view.nodes().await;
        Ok(Response::new(proto::ClusterJoinResponse {
            success: true,
            message: "Successfully joined cluster".into(),
            existing_nodes: nodes.iter().map(Into::into).collect(),
            cluster_id: CLUSTER_ID.into(),
        }))
    }

    async fn leave_cluster(
        &self,
        request: Request<proto::ClusterLeaveRequest>,
    ) -> Result<Response<proto::ClusterLeaveResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "LeaveCluster");
        let req = request.into_inner();
        info!(node_id = %req.node_id, reason = %req.reason, "cluster leave request");
        Ok(Response::new(proto::ClusterLeaveResponse {
            success: true,
            message: "Successfully left cluster".into(),
        }))
    }

    async fn get_cluster_info(
        &self,
        _request: Request<proto::ClusterInfoRequest>,
    ) -> Result<Response<proto::ClusterInfoResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "GetClusterInfo");
        let nodes = self.view.nodes().await;
        Ok(Response::new(proto::ClusterInfoResponse {
            cluster_id: CLUSTER_ID.into(),
            nodes: nodes.iter().map(Into::into).collect(),
            models: Vec::new(),
            metrics: Some(cluster_metrics(&nodes)),
        }))
    }
}
