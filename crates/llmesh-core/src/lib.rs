//! llmesh-core — shared data model for the llmesh cluster.
//!
//! Holds the value types passed between membership, the resource
//! broadcaster, the RPC layer, and console discovery, together with the
//! validation rules and the `llmesh.toml` config format.

pub mod config;
pub mod error;
pub mod types;
pub mod validate;

pub use config::{AgentConfig, ConsoleConfig, ConsoleMode, LlmeshConfig, parse_seed_list};
pub use error::{CoreError, CoreResult};
pub use types::*;
pub use validate::{validate_node_id, validate_port, validate_port_pair};
