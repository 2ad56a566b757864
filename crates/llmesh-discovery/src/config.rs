//! How the console finds agents, and how often it looks.

use std::time::Duration;

use llmesh_core::{ConsoleConfig, ConsoleMode};

/// Container and service names agents are commonly deployed under.
pub const SERVICE_NAMES: [&str; 3] = ["distributed-llm-agent", "agent", "llm-agent"];

/// Ports probed in orchestrator mode.
pub const PROBE_PORTS: [u16; 4] = [8080, 8081, 8082, 8083];

/// RPC port assumed when an address does not carry one.
pub const DEFAULT_AGENT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    /// Connect to each seed, retrying until it answers.
    Static { seeds: Vec<String> },
    /// Probe well-known container names and local ports.
    Orchestrator,
    /// Probe namespaced cluster service names and the SRV record.
    Dns { namespace: String },
    /// Static seeds, then follow every known agent's peer list.
    GossipChain { seeds: Vec<String> },
}

impl DiscoveryStrategy {
    /// Strategy matching the console's configured mode.
    pub fn from_console(config: &ConsoleConfig) -> Self {
        match config.mode {
            ConsoleMode::Docker => DiscoveryStrategy::Orchestrator,
            ConsoleMode::Kubernetes => DiscoveryStrategy::Dns {
                namespace: config.k8s_namespace.clone(),
            },
            ConsoleMode::Seeds => DiscoveryStrategy::GossipChain {
                seeds: config.effective_seeds(),
            },
            ConsoleMode::Static => DiscoveryStrategy::Static {
                seeds: config.effective_seeds(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryStrategy::Static { .. } => "static",
            DiscoveryStrategy::Orchestrator => "orchestrator",
            DiscoveryStrategy::Dns { .. } => "dns",
            DiscoveryStrategy::GossipChain { .. } => "gossip_chain",
        }
    }
}

/// Every `name:port` pair probed in orchestrator mode, plus local ports.
pub fn orchestrator_addresses() -> Vec<String> {
    let mut addresses: Vec<String> = SERVICE_NAMES
        .iter()
        .flat_map(|name| PROBE_PORTS.iter().map(move |port| format!("{name}:{port}")))
        .collect();
    addresses.extend(PROBE_PORTS.iter().map(|port| format!("localhost:{port}")));
    addresses
}

/// Cluster-local service addresses probed in DNS mode.
pub fn dns_service_addresses(namespace: &str) -> Vec<String> {
    SERVICE_NAMES
        .iter()
        .map(|name| format!("{name}.{namespace}.svc.cluster.local:{DEFAULT_AGENT_PORT}"))
        .collect()
}

/// SRV record advertising agent gRPC endpoints in `namespace`.
pub fn srv_record_name(namespace: &str) -> String {
    format!("_grpc._tcp.distributed-llm.{namespace}.svc.cluster.local")
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub strategy: DiscoveryStrategy,
    /// Delay between attempts on an unreachable seed.
    pub retry_interval: Duration,
    pub orchestrator_interval: Duration,
    pub dns_interval: Duration,
    /// Period of peer-list crawling in gossip-chain mode.
    pub peer_interval: Duration,
    /// Period of each agent's health poll.
    pub health_interval: Duration,
    /// Consecutive failed polls before an agent is dropped.
    pub failure_threshold: u32,
}

impl DiscoveryConfig {
    pub fn new(strategy: DiscoveryStrategy) -> Self {
        Self {
            strategy,
            retry_interval: Duration::from_secs(5),
            orchestrator_interval: Duration::from_secs(5),
            dns_interval: Duration::from_secs(10),
            peer_interval: Duration::from_secs(30),
            health_interval: Duration::from_secs(10),
            failure_threshold: 1,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_probe_intervals(mut self, orchestrator: Duration, dns: Duration, peers: Duration) -> Self {
        self.orchestrator_interval = orchestrator;
        self.dns_interval = dns;
        self.peer_interval = peers;
        self
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Never below one.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }
}
