//! llmesh-discovery — how the management console finds agents.
//!
//! One [`DiscoveryStrategy`] per console:
//!
//! | strategy       | probes                                   | every |
//! |----------------|------------------------------------------|-------|
//! | `Static`       | configured seeds, retried until reached  | 5 s   |
//! | `Orchestrator` | well-known container names and local ports | 5 s |
//! | `Dns`          | namespaced service names + SRV record    | 10 s  |
//! | `GossipChain`  | seeds, then every agent's peer list      | 30 s  |
//!
//! Every registered agent gets a health monitor; the console consumes
//! node-list snapshots from a bounded channel.

pub mod agents;
pub mod config;
pub mod connector;
pub mod error;
pub mod srv;

pub use agents::{AgentDiscovery, split_host_port};
pub use config::{DiscoveryConfig, DiscoveryStrategy};
pub use connector::{AgentConnector, AgentHandle, GrpcAgent, GrpcConnector};
pub use error::{DiscoveryError, DiscoveryResult};
pub use srv::{HickorySrvResolver, SrvResolver};
