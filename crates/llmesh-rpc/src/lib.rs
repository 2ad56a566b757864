//! llmesh-rpc — the gRPC surface of an agent.
//!
//! ```text
//!   RpcServer (one listener, gzip both ways)
//!     ├── NodeServer       resources, inference, health, peers, metrics
//!     ├── DiscoveryServer  node discovery, join/leave acks, cluster info
//!     └── ConsoleServer    node/model lists, update stream, commands
//!              │
//!              ▼
//!         ClusterView  ──▶ Membership + Broadcaster
//! ```
//!
//! [`AgentClient`] is the matching typed client used by console discovery.

pub mod client;
pub mod console;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod node;
pub mod server;
pub mod view;

mod timer;

/// Wire messages and generated service stubs.
pub mod proto;

pub use client::{AgentClient, CALL_TIMEOUT, CONNECT_TIMEOUT};
pub use console::{ConsoleServer, UpdateKind, model_catalog};
pub use discovery::DiscoveryServer;
pub use error::{RpcError, RpcResult};
pub use node::NodeServer;
pub use server::RpcServer;
pub use view::{CLUSTER_ID, ClusterView, cluster_metrics};
