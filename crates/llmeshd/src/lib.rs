//! llmeshd — the llmesh daemon.
//!
//! `agent` runs a cluster node, `console` runs headless agent discovery,
//! and `exec` sends one console command to an agent.

pub mod agent;
pub mod console;
pub mod http;
pub mod logging;
pub mod settings;
