//! Assembles the three services on one tonic server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use llmesh_agent::InferenceEngine;
use llmesh_metrics::MetricsHandle;

use crate::console::ConsoleServer;
use crate::discovery::DiscoveryServer;
use crate::error::{RpcError, RpcResult};
use crate::node::NodeServer;
use crate::view::ClusterView;

/// Node, discovery, and console services over one listener, all with gzip.
pub struct RpcServer {
    node: NodeServer,
    discovery: DiscoveryServer,
    console: ConsoleServer,
}

impl RpcServer {
    pub fn new(view: ClusterView, engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            node: NodeServer::new(view.clone(), engine),
            discovery: DiscoveryServer::new(view.clone()),
            console: ConsoleServer::new(view),
        }
    }

    pub fn with_metrics(self, metrics: MetricsHandle) -> Self {
        Self {
            node: self.node.with_metrics(metrics.clone()),
            discovery: self.discovery.with_metrics(metrics.clone()),
            console: self.console.with_metrics(metrics),
        }
    }

    /// Bind a listener for [`RpcServer::serve`].
    pub async fn bind(addr: SocketAddr) -> RpcResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| RpcError::Bind { addr, source })
    }

    /// Serve until `shutdown` turns true (or its sender is dropped).
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> RpcResult<()> {
        let local = listener.local_addr().ok();
        info!(addr = ?local, "gRPC server starting");

        Server::builder()
            .add_service(self.node.into_service())
            .add_service(self.discovery.into_service())
            .add_service(self.console.into_service())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await?;

        info!(addr = ?local, "gRPC server stopped");
        Ok(())
    }
}
