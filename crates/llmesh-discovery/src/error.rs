use thiserror::Error;

use llmesh_rpc::RpcError;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("SRV lookup failed: {0}")]
    Resolve(String),

    #[error("agent {0} is unreachable")]
    Unreachable(String),

    #[error("client for {0} is closed")]
    Closed(String),

    #[error("discovery already started")]
    AlreadyStarted,

    #[error("discovery has been stopped")]
    Stopped,
}
