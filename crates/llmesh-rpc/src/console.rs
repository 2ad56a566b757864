//! `ConsoleService`: the management console's read and command surface.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use llmesh_core::{Model, epoch_secs};
use llmesh_metrics::MetricsHandle;

use crate::proto;
use crate::proto::console_service_server::{ConsoleService, ConsoleServiceServer};
use crate::timer::CallTimer;
use crate::view::{ClusterView, cluster_metrics};

/// Stream period used when the caller asks for less than one second.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// Category of a streamed [`proto::ClusterUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Nodes,
    Models,
    Metrics,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 3] = [UpdateKind::Nodes, UpdateKind::Models, UpdateKind::Metrics];

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Nodes => "nodes",
            UpdateKind::Models => "models",
            UpdateKind::Metrics => "metrics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nodes" => Some(UpdateKind::Nodes),
            "models" => Some(UpdateKind::Models),
            "metrics" => Some(UpdateKind::Metrics),
            _ => None,
        }
    }

    /// Parse a requested type list. Empty means every kind.
    pub fn parse_list(types: &[String]) -> Result<Vec<Self>, String> {
        if types.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        types
            .iter()
            .map(|t| Self::parse(t).ok_or_else(|| format!("unknown update type: {t}")))
            .collect()
    }
}

/// The fixed model catalog served to consoles.
pub fn model_catalog() -> Vec<Model> {
    vec![
        Model {
            id: "llama-7b".into(),
            name: "Llama 2 7B".into(),
            version: "v1.0".into(),
            layer_count: 32,
            file_path: "/models/llama-7b.bin".into(),
            size: 13_000_000_000,
        },
        Model {
            id: "mistral-7b".into(),
            name: "Mistral 7B".into(),
            version: "v0.1".into(),
            layer_count: 32,
            file_path: "/models/mistral-7b.bin".into(),
            size: 14_000_000_000,
        },
    ]
}

/// Run one console command from the closed command set.
pub fn execute(command: &str) -> proto::CommandResponse {
    match command {
        "status" => proto::CommandResponse {
            success: true,
            output: "Cluster is running normally".into(),
            error: String::new(),
            exit_code: 0,
        },
        "ping" => proto::CommandResponse {
            success: true,
            output: "pong".into(),
            error: String::new(),
            exit_code: 0,
        },
        other => proto::CommandResponse {
            success: false,
            output: String::new(),
            error: format!("Unknown command: {other}"),
            exit_code: 1,
        },
    }
}

async fn build_update(view: &ClusterView, kind: UpdateKind) -> proto::ClusterUpdate {
    let mut update = proto::ClusterUpdate {
        update_type: kind.as_str().into(),
        timestamp: epoch_secs() as i64,
        ..Default::default()
    };
    match kind {
        UpdateKind::Nodes => {
            update.nodes = view.nodes().await.iter().map(Into::into).collect();
        }
        UpdateKind::Models => {
            update.models = model_catalog().iter().map(Into::into).collect();
        }
        UpdateKind::Metrics => {
            update.metrics = Some(cluster_metrics(&view.nodes().await));
        }
    }
    update
}

/// gRPC implementation of the console service.
pub struct ConsoleServer {
    view: ClusterView,
    metrics: MetricsHandle,
}

impl ConsoleServer {
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

    pub fn into_service(self) -> ConsoleServiceServer<Self> {
        ConsoleServiceServer::new(self)
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip)
    }
}

#[tonic::async_trait]
impl ConsoleService for ConsoleServer {
    async fn get_node_list(
        &self,
        request: Request<proto::NodeListRequest>,
    ) -> Result<Response<proto::NodeListResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "GetNodeList");
        let req = request.into_inner();
        let nodes = self.view.nodes().await;
        Ok(Response::new(proto::NodeListResponse {
            cluster_metrics: req.include_metrics.then(|| cluster_metrics(&nodes)),
            nodes: nodes.iter().map(Into::into).collect(),
        }))
    }

    async fn get_model_list(
        &self,
        _request: Request<proto::ModelListRequest>,
    ) -> Result<Response<proto::ModelListResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "GetModelList");
        Ok(Response::new(proto::ModelListResponse {
            models: model_catalog().iter().map(Into::into).collect(),
        }))
    }

    type StreamUpdatesStream = ReceiverStream<Result<proto::ClusterUpdate, Status>>;

    async fn stream_updates(
        &self,
        request: Request<proto::UpdateStreamRequest>,
    ) -> Result<Response<Self::StreamUpdatesStream>, Status> {
        let req = request.into_inner();
        let kinds = UpdateKind::parse_list(&req.update_types).map_err(Status::invalid_argument)?;
        let period = if req.interval_seconds < 1 {
            DEFAULT_UPDATE_INTERVAL
        } else {
            Duration::from_secs(req.interval_seconds as u64)
        };

        let (tx, rx) = mpsc::channel(8);
        let view = self.view.clone();
        let timer = CallTimer::start(&self.metrics, "StreamUpdates");

        debug!(requester = %req.requester_id, ?kinds, period_secs = period.as_secs(), "update stream opened");
        tokio::spawn(async move {
            let _timer = timer;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            'stream: loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for kind in &kinds {
                            let update = build_update(&view, *kind).await;
                            if tx.send(Ok(update)).await.is_err() {
                                break 'stream;
                            }
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
            debug!("update stream closed");
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn execute_command(
        &self,
        request: Request<proto::CommandRequest>,
    ) -> Result<Response<proto::CommandResponse>, Status> {
        let _timer = CallTimer::start(&self.metrics, "ExecuteCommand");
        let req = request.into_inner();
        info!(requester = %req.requester_id, command = %req.command, args = ?req.args, "command execution request");
        Ok(Response::new(execute(&req.command)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands() {
        let status = execute("status");
        assert!(status.success);
        assert_eq!(status.output, "Cluster is running normally");
        assert_eq!(status.exit_code, 0);

        let ping = execute("ping");
        assert!(ping.success);
        assert_eq!(ping.output, "pong");
    }

    #[test]
    fn unknown_command_fails_with_exit_code() {
        let resp = execute("reboot");
        assert!(!resp.success);
        assert_eq!(resp.error, "Unknown command: reboot");
        assert_eq!(resp.exit_code, 1);
        assert!(resp.output.is_empty());
    }

    #[test]
    fn update_types_parse() {
        assert_eq!(UpdateKind::parse_list(&[]).unwrap(), UpdateKind::ALL.to_vec());
        assert_eq!(
            UpdateKind::parse_list(&["metrics".to_string()]).unwrap(),
            vec![UpdateKind::Metrics]
        );
        let err = UpdateKind::parse_list(&["nodes".to_string(), "gpus".to_string()]).unwrap_err();
        assert!(err.contains("gpus"));
    }

    #[test]
    fn catalog_has_two_models() {
        let models = model_catalog();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "llama-7b");
        assert_eq!(models[1].size, 14_000_000_000);
        assert!(models.iter().all(|m| m.layer_count == 32));
    }
}
