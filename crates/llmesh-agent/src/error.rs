use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("used layers ({used}) exceed max layers ({max})")]
    LayerOvercommit { used: i32, max: i32 },

    #[error("invalid resources: {0}")]
    InvalidResources(#[from] llmesh_core::CoreError),

    #[error("invalid inference request: {0}")]
    InvalidRequest(String),

    #[error("inference failed: {0}")]
    Inference(String),
}
