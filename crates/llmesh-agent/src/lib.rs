//! llmesh-agent — per-node components of a cluster agent.
//!
//! - [`Broadcaster`]: authoritative local resource snapshot with lossy,
//!   non-blocking fan-out to in-process subscribers.
//! - [`resources`]: host CPU/RAM detection.
//! - [`engine`]: the inference seam behind `ProcessInference`.

pub mod broadcaster;
pub mod engine;
pub mod error;
pub mod resources;

pub use broadcaster::{BROADCAST_INTERVAL, Broadcaster};
pub use engine::{DEFAULT_MODEL, InferenceEngine, InferenceOutput, InferenceRequest, StubEngine};
pub use error::{AgentError, AgentResult};
pub use resources::detect_resources;
