//! Config file plus command-line overrides.

use std::path::Path;

use anyhow::Context;
use clap::Args;

use llmesh_core::{AgentConfig, ConsoleConfig, ConsoleMode, LlmeshConfig, parse_seed_list, validate_node_id};

/// Agent flags. Each one, when given, overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct AgentArgs {
    /// Unique node identifier (defaults to the hostname).
    #[arg(long, env = "LLMESH_NODE_ID")]
    pub node_id: Option<String>,

    /// Port for the gRPC server.
    #[arg(long, env = "LLMESH_BIND_PORT")]
    pub bind_port: Option<u16>,

    /// Port for gossip.
    #[arg(long, env = "LLMESH_GOSSIP_PORT")]
    pub gossip_port: Option<u16>,

    /// Port for Prometheus metrics.
    #[arg(long, env = "LLMESH_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Comma-separated gossip seeds (host:port).
    #[arg(long, env = "LLMESH_SEED_NODES")]
    pub seed_nodes: Option<String>,

    /// Layer capacity this node advertises.
    #[arg(long)]
    pub max_layers: Option<i32>,
}

impl AgentArgs {
    pub fn apply(&self, mut config: AgentConfig) -> AgentConfig {
        if let Some(id) = &self.node_id {
            config.node_id = Some(id.clone());
        }
        if let Some(port) = self.bind_port {
            config.bind_port = port;
        }
        if let Some(port) = self.gossip_port {
            config.gossip_port = port;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
        if let Some(seeds) = &self.seed_nodes {
            config.seeds = parse_seed_list(seeds);
        }
        if let Some(layers) = self.max_layers {
            config.max_layers = layers;
        }
        config
    }
}

/// Console flags. Each one, when given, overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConsoleArgs {
    /// Comma-separated agent addresses (host:port).
    #[arg(long, env = "LLMESH_SEED_NODES")]
    pub seed_nodes: Option<String>,

    /// Discover agents by well-known container names.
    #[arg(long, conflicts_with_all = ["k8s_namespace", "no_peer_crawl"])]
    pub docker: bool,

    /// Connect to the seeds only, without following their peer lists.
    #[arg(long, conflicts_with = "k8s_namespace")]
    pub no_peer_crawl: bool,

    /// Discover agents through service names in this Kubernetes namespace.
    #[arg(long)]
    pub k8s_namespace: Option<String>,

    /// Capacity of the node-list update channel.
    #[arg(long)]
    pub update_buffer: Option<usize>,
}

impl ConsoleArgs {
    pub fn apply(&self, mut config: ConsoleConfig) -> ConsoleConfig {
        if self.docker {
            config.mode = ConsoleMode::Docker;
        } else if let Some(namespace) = &self.k8s_namespace {
            config.mode = ConsoleMode::Kubernetes;
            config.k8s_namespace = namespace.clone();
        } else if self.no_peer_crawl {
            config.mode = ConsoleMode::Static;
        }
        if let Some(seeds) = &self.seed_nodes {
            config.seeds = parse_seed_list(seeds);
        }
        if let Some(buffer) = self.update_buffer {
            config.update_buffer = buffer.max(1);
        }
        config
    }
}

/// Read `path`, or use defaults when no file was given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LlmeshConfig> {
    match path {
        Some(path) => LlmeshConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(LlmeshConfig::default()),
    }
}

/// Configured node id, falling back to the hostname.
pub fn resolve_node_id(config: &AgentConfig) -> anyhow::Result<String> {
    let id = match &config.node_id {
        Some(id) => id.clone(),
        None => hostname::get()
            .context("reading hostname")?
            .into_string()
            .map_err(|_| anyhow::anyhow!("hostname is not valid UTF-8"))?,
    };
    validate_node_id(&id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[agent]\nnode_id = \"from-file\"\nbind_port = 9000\ngossip_port = 9001\nmax_layers = 8"
        )
        .unwrap();
        let config = load_config(Some(file.path())).unwrap();

        let args = AgentArgs {
            bind_port: Some(9100),
            seed_nodes: Some("10.0.0.1:7946, 10.0.0.2:7946".into()),
            ..Default::default()
        };
        let agent = args.apply(config.agent);
        assert_eq!(agent.node_id.as_deref(), Some("from-file"));
        assert_eq!(agent.bind_port, 9100);
        assert_eq!(agent.gossip_port, 9001);
        assert_eq!(agent.max_layers, 8);
        assert_eq!(agent.seeds, vec!["10.0.0.1:7946", "10.0.0.2:7946"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/llmesh.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/llmesh.toml"));
    }

    #[test]
    fn no_file_means_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.agent.bind_port, 8080);
    }

    #[test]
    fn console_mode_flags() {
        let docker = ConsoleArgs {
            docker: true,
            ..Default::default()
        }
        .apply(ConsoleConfig::default());
        assert_eq!(docker.mode, ConsoleMode::Docker);

        let k8s = ConsoleArgs {
            k8s_namespace: Some("llm".into()),
            update_buffer: Some(0),
            ..Default::default()
        }
        .apply(ConsoleConfig::default());
        assert_eq!(k8s.mode, ConsoleMode::Kubernetes);
        assert_eq!(k8s.k8s_namespace, "llm");
        assert_eq!(k8s.update_buffer, 1);

        let fixed = ConsoleArgs {
            no_peer_crawl: true,
            seed_nodes: Some("10.0.0.9:8080".into()),
            ..Default::default()
        }
        .apply(ConsoleConfig::default());
        assert_eq!(fixed.mode, ConsoleMode::Static);
        assert_eq!(fixed.seeds, vec!["10.0.0.9:8080"]);
    }

    #[test]
    fn node_id_falls_back_to_hostname() {
        let id = resolve_node_id(&AgentConfig::default()).unwrap();
        assert!(!id.is_empty());

        let explicit = AgentConfig {
            node_id: Some("gpu-1".into()),
            ..Default::default()
        };
        assert_eq!(resolve_node_id(&explicit).unwrap(), "gpu-1");

        let bad = AgentConfig {
            node_id: Some("bad\nid".into()),
            ..Default::default()
        };
        assert!(resolve_node_id(&bad).is_err());
    }
}
