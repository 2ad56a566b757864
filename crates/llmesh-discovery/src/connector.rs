//! Access to remote agents.
//!
//! Discovery only needs three things from an agent, so it talks to them
//! through [`AgentHandle`]; [`GrpcConnector`] is the production
//! implementation over [`AgentClient`].

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use llmesh_core::ResourceInfo;
use llmesh_rpc::AgentClient;

use crate::error::{DiscoveryError, DiscoveryResult};

/// An open connection to one agent.
#[async_trait]
pub trait AgentHandle: Send + Sync {
    fn address(&self) -> &str;

    async fn resources(&self) -> DiscoveryResult<ResourceInfo>;

    /// Peer RPC endpoints as `host:port`.
    async fn peers(&self) -> DiscoveryResult<Vec<String>>;

    /// Release the connection. Later calls fail.
    async fn close(&self);
}

#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self, address: &str) -> DiscoveryResult<Arc<dyn AgentHandle>>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// gRPC-backed agent handle.
pub struct GrpcAgent {
    address: String,
    client: Mutex<Option<AgentClient>>,
}

impl GrpcAgent {
    pub fn new(client: AgentClient) -> Self {
        Self {
            address: client.address().to_string(),
            client: Mutex::new(Some(client)),
        }
    }

    /// The underlying client, unless closed.
    pub fn client(&self) -> DiscoveryResult<AgentClient> {
        lock(&self.client)
            .clone()
            .ok_or_else(|| DiscoveryError::Closed(self.address.clone()))
    }
}

#[async_trait]
impl AgentHandle for GrpcAgent {
    fn address(&self) -> &str {
        &self.address
    }

    async fn resources(&self) -> DiscoveryResult<ResourceInfo> {
        Ok(self.client()?.resources().await?)
    }

    async fn peers(&self) -> DiscoveryResult<Vec<String>> {
        Ok(self.client()?.peers().await?)
    }

    async fn close(&self) {
        if lock(&self.client).take().is_some() {
            debug!(address = %self.address, "agent client closed");
        }
    }
}

/// Connects with [`AgentClient::connect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcConnector;

#[async_trait]
impl AgentConnector for GrpcConnector {
    async fn connect(&self, address: &str) -> DiscoveryResult<Arc<dyn AgentHandle>> {
        let client = AgentClient::connect(address).await?;
        Ok(Arc::new(GrpcAgent::new(client)))
    }
}
