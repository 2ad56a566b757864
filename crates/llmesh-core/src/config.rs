//! `llmesh.toml` configuration for agents and the console.
//!
//! Every field has a default so an empty file (or no file at all) yields a
//! usable single-node setup. CLI flags in `llmeshd` override file values.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, CoreResult};
use crate::types::GpuInfo;
use crate::validate::{validate_node_id, validate_port_pair};

pub const DEFAULT_BIND_PORT: u16 = 8080;
pub const DEFAULT_GOSSIP_PORT: u16 = 7946;
pub const DEFAULT_METRICS_PORT: u16 = 9090;
pub const DEFAULT_MAX_LAYERS: i32 = 20;

/// Top-level config file layout.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmeshConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

impl LlmeshConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Agent (cluster node) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Node id; the daemon falls back to the hostname when unset.
    pub node_id: Option<String>,
    /// gRPC port.
    pub bind_port: u16,
    /// UDP gossip port.
    pub gossip_port: u16,
    /// Prometheus exposition port.
    pub metrics_port: u16,
    /// Gossip seeds (`host:port`).
    pub seeds: Vec<String>,
    /// Layer capacity advertised by this node.
    pub max_layers: i32,
    /// Statically configured accelerators.
    pub gpus: Vec<GpuInfo>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            bind_port: DEFAULT_BIND_PORT,
            gossip_port: DEFAULT_GOSSIP_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            seeds: Vec::new(),
            max_layers: DEFAULT_MAX_LAYERS,
            gpus: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Validate everything that membership construction would reject.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(id) = &self.node_id {
            validate_node_id(id)?;
        }
        validate_port_pair(self.bind_port as u32, self.gossip_port as u32)?;
        if self.max_layers < 0 {
            return Err(CoreError::Validation(format!(
                "max_layers must be non-negative, got {}",
                self.max_layers
            )));
        }
        Ok(())
    }
}

/// How the console locates agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleMode {
    /// Connect to the configured seeds and follow their peer lists.
    #[default]
    Seeds,
    /// Connect to the configured seeds only, without following peers.
    Static,
    /// Probe well-known container service names.
    Docker,
    /// Probe namespaced Kubernetes service names and SRV records.
    Kubernetes,
}

/// Management console settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub mode: ConsoleMode,
    pub seeds: Vec<String>,
    pub k8s_namespace: String,
    /// Capacity of the node-list update channel handed to the UI.
    pub update_buffer: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            mode: ConsoleMode::Seeds,
            seeds: Vec::new(),
            k8s_namespace: "default".to_string(),
            update_buffer: 10,
        }
    }
}

impl ConsoleConfig {
    /// Seeds to use when none were configured, per mode.
    pub fn default_seeds(&self) -> Vec<String> {
        match self.mode {
            ConsoleMode::Docker => vec![
                "distributed-llm-agent:8080".to_string(),
                "agent:8080".to_string(),
                "localhost:8080".to_string(),
                "localhost:8081".to_string(),
                "localhost:8082".to_string(),
            ],
            ConsoleMode::Kubernetes => vec![
                format!("distributed-llm-agent.{}.svc.cluster.local:8080", self.k8s_namespace),
                format!("agent.{}.svc.cluster.local:8080", self.k8s_namespace),
            ],
            ConsoleMode::Seeds | ConsoleMode::Static => {
                vec!["localhost:8080".to_string(), "127.0.0.1:8080".to_string()]
            }
        }
    }

    /// Configured seeds, or the per-mode defaults when empty.
    pub fn effective_seeds(&self) -> Vec<String> {
        if self.seeds.is_empty() {
            self.default_seeds()
        } else {
            self.seeds.clone()
        }
    }
}

/// Split a comma-separated seed list, trimming whitespace and dropping
/// empty entries.
pub fn parse_seed_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = LlmeshConfig::default();
        assert_eq!(config.agent.bind_port, 8080);
        assert_eq!(config.agent.gossip_port, 7946);
        assert_eq!(config.agent.metrics_port, 9090);
        assert_eq!(config.agent.max_layers, 20);
        assert_eq!(config.console.k8s_namespace, "default");
        assert!(config.agent.validate().is_ok());
    }

    #[test]
    fn parse_partial_file() {
        let config = LlmeshConfig::from_toml(
            r#"
[agent]
node_id = "gpu-box-1"
seeds = ["10.0.0.2:7946"]

[[agent.gpus]]
name = "RTX 4090"
memory_mb = 24576
uuid = "gpu-0"

[console]
mode = "kubernetes"
k8s_namespace = "llm"
"#,
        )
        .unwrap();

        assert_eq!(config.agent.node_id.as_deref(), Some("gpu-box-1"));
        assert_eq!(config.agent.bind_port, 8080);
        assert_eq!(config.agent.seeds, vec!["10.0.0.2:7946"]);
        assert_eq!(config.agent.gpus.len(), 1);
        assert_eq!(config.console.mode, ConsoleMode::Kubernetes);
        assert_eq!(
            config.console.effective_seeds()[0],
            "distributed-llm-agent.llm.svc.cluster.local:8080"
        );
    }

    #[test]
    fn from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nbind_port = 9000\ngossip_port = 9001").unwrap();

        let config = LlmeshConfig::from_file(file.path()).unwrap();
        assert_eq!(config.agent.bind_port, 9000);
        assert_eq!(config.agent.gossip_port, 9001);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = LlmeshConfig::from_file(Path::new("/nonexistent/llmesh.toml")).unwrap_err();
        assert!(matches!(err, CoreError::ReadConfig { .. }));
    }

    #[test]
    fn colliding_ports_rejected() {
        let config = AgentConfig {
            bind_port: 7946,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn seed_list_parsing() {
        assert_eq!(
            parse_seed_list(" a:1, b:2,,c:3 "),
            vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()]
        );
        assert!(parse_seed_list("").is_empty());
    }

    #[test]
    fn explicit_seeds_override_defaults() {
        let config = ConsoleConfig {
            seeds: vec!["10.0.0.9:8080".to_string()],
            ..Default::default()
        };
        assert_eq!(config.effective_seeds(), vec!["10.0.0.9:8080"]);
    }
}
