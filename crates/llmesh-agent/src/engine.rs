//! Inference engine seam. Only a stub exists; real model execution lives
//! outside this workspace.

use async_trait::async_trait;

use crate::error::{AgentError, AgentResult};

/// Model id reported when a request does not name one.
pub const DEFAULT_MODEL: &str = "default_model";

#[derive(Debug, Clone, Default)]
pub struct InferenceRequest {
    pub request_id: String,
    pub model_id: String,
    pub prompt: String,
    pub max_tokens: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub text: String,
    pub tokens_generated: u32,
}

#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn infer(&self, request: &InferenceRequest) -> AgentResult<InferenceOutput>;
}

/// Answers every prompt with a greeting naming the node.
pub struct StubEngine {
    node_id: String,
}

impl StubEngine {
    /// Token count reported for every stub response.
    pub const TOKENS: u32 = 10;

    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

#[async_trait]
impl InferenceEngine for StubEngine {
    async fn infer(&self, request: &InferenceRequest) -> AgentResult<InferenceOutput> {
        if request.prompt.is_empty() {
            return Err(AgentError::InvalidRequest("prompt cannot be empty".into()));
        }
        Ok(InferenceOutput {
            text: format!("Hello from node {}", self.node_id),
            tokens_generated: Self::TOKENS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_greets() {
        let engine = StubEngine::new("node-7");
        let out = engine
            .infer(&InferenceRequest {
                prompt: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.text, "Hello from node node-7");
        assert_eq!(out.tokens_generated, 10);
    }

    #[tokio::test]
    async fn empty_prompt_rejected() {
        let engine = StubEngine::new("node-7");
        let err = engine.infer(&InferenceRequest::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
    }
}
