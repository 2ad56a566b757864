//! `NodeService`: per-node resources, inference, health, and peers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use llmesh_agent::{AgentError, DEFAULT_MODEL, InferenceEngine, InferenceRequest};
use llmesh_metrics::MetricsHandle;

use crate::proto;
use crate::proto::node_service_server::{NodeService, NodeServiceServer};
use crate::timer::CallTimer;
use crate::view::ClusterView;

/// gRPC implementation of the node service.
pub struct NodeServer {
    view: ClusterView,
    engine: Arc<dyn InferenceEngine>,
    metrics: MetricsHandle,
}

impl NodeServer {
    pub fn new(view: ClusterView, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            view,
            engine,
            metrics: MetricsHandle::disabled(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self) -> NodeServiceServer<Self> {
        NodeServiceServer::new(self)
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip)
    }
}

#[tonic::async_trait]
impl NodeService for NodeServer {
    async fn register_node(
        &self,
        request: Request<proto::RegisterNodeRequest>,
    ) -> Result<Response<proto::RegisterNodeResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "RegisterNode");
        let req = request.into_inner();
        if req.node_id.is_empty() {
            return Err(Status::invalid_argument("node_id cannot be empty"));
        }

        info!(node_id = %req.node_id, address = %req.address, port = req.port, "node registration");
        Ok(Response::new(proto::RegisterNodeResponse {
            success: true,
            message: "Node registered successfully".into(),
        }))
    }

    async fn get_resources(
        &self,
        _request: Request<proto::GetResourcesRequest>,
    ) -> Result<Response<proto::GetResourcesResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "GetResources");
        let resources = self.view.broadcaster().resources().await;
        Ok(Response::new(proto::GetResourcesResponse {
            available_layers: resources.available_layers(),
            resources: Some((&resources).into()),
        }))
    }

    async fn process_inference(
        &self,
        request: Request<proto::InferenceRequest>,
    ) -> Result<Response<proto::InferenceResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "ProcessInference");
        let req = request.into_inner();
        let model_id = if req.model_id.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            req.model_id.clone()
        };

        let started = Instant::now();
        if req.prompt.is_empty() {
            self.metrics
                .record_inference_request(&model_id, "error", started.elapsed(), 0);
            return Err(Status::invalid_argument("prompt cannot be empty"));
        }

        let result = self
            .engine
            .infer(&InferenceRequest {
                request_id: req.request_id.clone(),
                model_id: model_id.clone(),
                prompt: req.prompt,
                max_tokens: req.max_tokens,
            })
            .await;

        match result {
            Ok(output) => {
                self.metrics.record_inference_request(
                    &model_id,
                    "success",
                    started.elapsed(),
                    output.tokens_generated,
                );
                debug!(request_id = %req.request_id, %model_id, tokens = output.tokens_generated, "inference done");
                Ok(Response::new(proto::InferenceResponse {
                    request_id: req.request_id,
                    generated_text: output.text,
                    success: true,
                    error: String::new(),
                    tokens_generated: i32::try_from(output.tokens_generated).unwrap_or(i32::MAX),
                }))
            }
            Err(AgentError::InvalidRequest(msg)) => {
                self.metrics
                    .record_inference_request(&model_id, "error", started.elapsed(), 0);
                Err(Status::invalid_argument(msg))
            }
            Err(e) => {
                self.metrics
                    .record_inference_request(&model_id, "error", started.elapsed(), 0);
                warn!(request_id = %req.request_id, %model_id, error = %e, "inference failed");
                Ok(Response::new(proto::InferenceResponse {
                    request_id: req.request_id,
                    success: false,
                    error: e.to_string(),
                    ..Default::default()
                }))
            }
        }
    }

    async fn health_check(
        &self,
        _request: Request<proto::HealthCheckRequest>,
    ) -> Result<Response<proto::HealthCheckResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "HealthCheck");
        Ok(Response::new(proto::HealthCheckResponse {
            healthy: true,
            status: "running".into(),
            uptime_seconds: self.view.uptime().as_secs() as i64,
        }))
    }

    async fn get_peers(
        &self,
        _request: Request<proto::GetPeersRequest>,
    ) -> Result<Response<proto::GetPeersResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "GetPeers");
        let peers = self.view.peers().await;
        Ok(Response::new(proto::GetPeersResponse {
            peers: peers.iter().map(Into::into).collect(),
        }))
    }

    async fn get_metrics(
        &self,
        _request: Request<proto::GetMetricsRequest>,
    ) -> Result<Response<proto::GetMetricsResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "GetMetrics");
        Ok(Response::new(proto::GetMetricsResponse {
            metrics: Some(self.view.node_metrics().await),
        }))
    }

    type StreamMetricsStream = ReceiverStream<Result<proto::NodeMetrics, Status>>;

    async fn stream_metrics(
        &self,
        request: Request<proto::StreamMetricsRequest>,
    ) -> Result<Response<Self::StreamMetricsStream>, Status> {
        let req = request.into_inner();
        let period = Duration::from_secs(req.interval_seconds.max(1) as u64);
        let (tx, rx) = mpsc::channel(4);
        let view = self.view.clone();
        let timer = CallTimer::start(&self.metrics, "StreamMetrics");

        debug!(requester = %req.node_id, period_secs = period.as_secs(), "metrics stream opened");
        tokio::spawn(async move {
            let _timer = timer;
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if tx.send(Ok(view.node_metrics().await)).await.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
            debug!("metrics stream closed");
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
