use std::net::SocketAddr;

use thiserror::Error;

use llmesh_core::CoreError;

pub type GossipResult<T> = Result<T, GossipError>;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("validation error: {0}")]
    Validation(#[from] CoreError),

    #[error("failed to bind gossip socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("gossip I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gossip message encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("membership has not been started")]
    NotStarted,

    #[error("membership has been stopped")]
    Stopped,

    #[error("membership already started")]
    AlreadyStarted,

    #[error("failed to join cluster: {0}")]
    JoinFailed(String),

    #[error("leave timed out after {0:?}")]
    LeaveTimeout(std::time::Duration),
}
