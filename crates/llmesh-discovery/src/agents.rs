//! Agent discovery and health tracking for the console.
//!
//! ```text
//!   probe loop / seed task ──▶ try_connect(addr)
//!                                 │ connect + GetResources (no lock held)
//!                                 ▼
//!                         registry (one RwLock) ──▶ updates (try_send)
//!                                 │
//!                                 └── health monitor per agent
//!                                       poll every health_interval,
//!                                       drop after failure_threshold misses
//! ```
//!
//! The registry is keyed by the address an agent was reached at. Callers
//! only ever receive copies of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use llmesh_core::{Node, NodeStatus, epoch_secs};

use crate::config::{
    DEFAULT_AGENT_PORT, DiscoveryConfig, DiscoveryStrategy, dns_service_addresses,
    orchestrator_addresses, srv_record_name,
};
use crate::connector::{AgentConnector, AgentHandle, GrpcConnector};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::srv::{HickorySrvResolver, SrvResolver};

/// Split `host:port`. A missing or unparsable port yields
/// [`DEFAULT_AGENT_PORT`]; IPv6 brackets are stripped from the host.
pub fn split_host_port(address: &str) -> (String, u16) {
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.ends_with(':') => {
            (host, port.parse().unwrap_or(DEFAULT_AGENT_PORT))
        }
        _ => (address, DEFAULT_AGENT_PORT),
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    (host.to_string(), port)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Orchestrator,
    Dns,
    Peers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Stopped,
}

#[derive(Default)]
struct Registry {
    nodes: HashMap<String, Node>,
    clients: HashMap<String, Arc<dyn AgentHandle>>,
    monitors: HashMap<String, JoinHandle<()>>,
}

struct Shared {
    config: DiscoveryConfig,
    connector: Arc<dyn AgentConnector>,
    resolver: Option<Arc<dyn SrvResolver>>,
    updates: Option<mpsc::Sender<Vec<Node>>>,
    registry: RwLock<Registry>,
    shutdown: watch::Sender<bool>,
}

struct Runtime {
    phase: Phase,
    tasks: Vec<JoinHandle<()>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Finds agents with one [`DiscoveryStrategy`] and keeps their resource
/// snapshots fresh.
pub struct AgentDiscovery {
    shared: Arc<Shared>,
    runtime: Mutex<Runtime>,
}

impl AgentDiscovery {
    pub fn new(config: DiscoveryConfig, connector: Arc<dyn AgentConnector>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                resolver: None,
                updates: None,
                registry: RwLock::new(Registry::default()),
                shutdown,
            }),
            runtime: Mutex::new(Runtime {
                phase: Phase::Created,
                tasks: Vec::new(),
            }),
        }
    }

    /// Discovery over gRPC, with a system-configured SRV resolver for the
    /// DNS strategy.
    pub fn grpc(config: DiscoveryConfig) -> Self {
        let wants_srv = matches!(config.strategy, DiscoveryStrategy::Dns { .. });
        let discovery = Self::new(config, Arc::new(GrpcConnector));
        if !wants_srv {
            return discovery;
        }
        match HickorySrvResolver::from_system_conf() {
            Ok(resolver) => discovery.with_resolver(Arc::new(resolver)),
            Err(e) => {
                warn!(error = %e, "no system DNS configuration; SRV discovery disabled");
                discovery
            }
        }
    }

    /// Set the SRV resolver. Must be called before `start`.
    pub fn with_resolver(mut self, resolver: Arc<dyn SrvResolver>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.resolver = Some(resolver),
            None => warn!("resolver attached after start; ignoring"),
        }
        self
    }

    /// Deliver a full node snapshot on `updates` after every registry
    /// change. Snapshots are dropped while the channel is full. Must be
    /// called before `start`.
    pub fn with_updates(mut self, updates: mpsc::Sender<Vec<Node>>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.updates = Some(updates),
            None => warn!("update channel attached after start; ignoring"),
        }
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.shared.config
    }

    /// Launch the strategy's background tasks.
    pub fn start(&self) -> DiscoveryResult<()> {
        let mut rt = lock(&self.runtime);
        match rt.phase {
            Phase::Running => return Err(DiscoveryError::AlreadyStarted),
            Phase::Stopped => return Err(DiscoveryError::Stopped),
            Phase::Created => {}
        }

        let config = &self.shared.config;
        info!(strategy = config.strategy.name(), "starting agent discovery");
        match &config.strategy {
            DiscoveryStrategy::Static { seeds } => {
                rt.tasks.extend(self.spawn_seed_tasks(seeds));
            }
            DiscoveryStrategy::Orchestrator => {
                rt.tasks
                    .push(self.spawn_probe(Probe::Orchestrator, config.orchestrator_interval));
            }
            DiscoveryStrategy::Dns { .. } => {
                rt.tasks.push(self.spawn_probe(Probe::Dns, config.dns_interval));
            }
            DiscoveryStrategy::GossipChain { seeds } => {
                rt.tasks.extend(self.spawn_seed_tasks(seeds));
                rt.tasks
                    .push(self.spawn_probe(Probe::Peers, config.peer_interval));
            }
        }
        rt.phase = Phase::Running;
        Ok(())
    }

    /// Connect to `address` and register it unless already known. Returns
    /// whether the agent is registered afterwards.
    pub async fn try_connect(&self, address: &str) -> bool {
        self.shared.try_connect(address).await
    }

    /// Copies of every registered node, ordered by id.
    pub async fn nodes(&self) -> Vec<Node> {
        self.shared.snapshot().await
    }

    pub async fn node_count(&self) -> usize {
        self.shared.registry.read().await.nodes.len()
    }

    /// The open handle for `address`, if registered.
    pub async fn client(&self, address: &str) -> Option<Arc<dyn AgentHandle>> {
        self.shared.registry.read().await.clients.get(address).cloned()
    }

    /// Stop every task, close every client, and clear the registry.
    /// Idempotent; discovery cannot be restarted.
    pub async fn stop(&self) {
        let tasks = {
            let mut rt = lock(&self.runtime);
            if rt.phase == Phase::Stopped {
                return;
            }
            rt.phase = Phase::Stopped;
            std::mem::take(&mut rt.tasks)
        };
        self.shared.shutdown.send_replace(true);
        for task in &tasks {
            task.abort();
        }

        let clients: Vec<Arc<dyn AgentHandle>> = {
            let mut registry = self.shared.registry.write().await;
            for (_, monitor) in registry.monitors.drain() {
                monitor.abort();
            }
            registry.nodes.clear();
            registry.clients.drain().map(|(_, c)| c).collect()
        };
        for client in &clients {
            client.close().await;
        }
        info!(closed = clients.len(), "agent discovery stopped");
    }

    fn spawn_seed_tasks(&self, seeds: &[String]) -> Vec<JoinHandle<()>> {
        seeds
            .iter()
            .map(|seed| {
                let shared = self.shared.clone();
                let seed = seed.clone();
                tokio::spawn(async move { shared.connect_with_retry(&seed).await })
            })
            .collect()
    }

    fn spawn_probe(&self, probe: Probe, period: Duration) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let mut shutdown = self.shared.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = shared.run_probe(probe) => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!(?probe, "probe loop exited");
        })
    }
}

impl Shared {
    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn try_connect(self: &Arc<Self>, address: &str) -> bool {
        if self.stopping() {
            return false;
        }
        if self.registry.read().await.clients.contains_key(address) {
            return true;
        }

        let handle = match self.connector.connect(address).await {
            Ok(handle) => handle,
            Err(e) => {
                debug!(%address, error = %e, "agent connect failed");
                return false;
            }
        };
        let resources = match handle.resources().await {
            Ok(resources) => resources,
            Err(e) => {
                debug!(%address, error = %e, "agent did not report resources");
                handle.close().await;
                return false;
            }
        };

        let (host, port) = split_host_port(address);
        let node = Node {
            id: format!("agent-{address}"),
            address: host,
            port,
            resources,
            status: NodeStatus::Online,
            last_seen: epoch_secs(),
        };

        {
            let mut registry = self.registry.write().await;
            if self.stopping() || registry.clients.contains_key(address) {
                let registered = !self.stopping();
                drop(registry);
                handle.close().await;
                return registered;
            }
            registry.nodes.insert(address.to_string(), node);
            registry.clients.insert(address.to_string(), handle.clone());
            let monitor = tokio::spawn(monitor_agent(
                self.clone(),
                address.to_string(),
                handle,
                self.shutdown.subscribe(),
            ));
            registry.monitors.insert(address.to_string(), monitor);
        }

        info!(%address, "agent connected");
        self.notify().await;
        true
    }

    async fn connect_with_retry(self: &Arc<Self>, address: &str) {
        let mut shutdown = self.shutdown.subscribe();
        info!(%address, "connecting to seed agent");
        loop {
            if self.try_connect(address).await {
                return;
            }
            debug!(%address, retry_in = ?self.config.retry_interval, "seed agent unreachable");
            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_interval) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    async fn run_probe(self: &Arc<Self>, probe: Probe) {
        match probe {
            Probe::Orchestrator => {
                for address in orchestrator_addresses() {
                    if self.try_connect(&address).await {
                        debug!(%address, "orchestrator probe found agent");
                    }
                }
            }
            Probe::Dns => {
                let DiscoveryStrategy::Dns { namespace } = &self.config.strategy else {
                    return;
                };
                for address in dns_service_addresses(namespace) {
                    if self.try_connect(&address).await {
                        debug!(%address, "service probe found agent");
                    }
                }
                self.probe_srv(namespace).await;
            }
            Probe::Peers => self.crawl_peers().await,
        }
    }

    async fn probe_srv(self: &Arc<Self>, namespace: &str) {
        let Some(resolver) = &self.resolver else {
            return;
        };
        let name = srv_record_name(namespace);
        match resolver.lookup(&name).await {
            Ok(targets) => {
                for address in targets {
                    if self.try_connect(&address).await {
                        debug!(%address, "SRV record led to agent");
                    }
                }
            }
            Err(e) => debug!(%name, error = %e, "no SRV records"),
        }
    }

    /// Ask every connected agent for its peers and try each one.
    async fn crawl_peers(self: &Arc<Self>) {
        let clients: Vec<Arc<dyn AgentHandle>> =
            self.registry.read().await.clients.values().cloned().collect();
        for client in clients {
            let peers = match client.peers().await {
                Ok(peers) => peers,
                Err(e) => {
                    debug!(address = client.address(), error = %e, "peer list unavailable");
                    continue;
                }
            };
            for peer in peers {
                if self.try_connect(&peer).await {
                    debug!(address = %peer, via = client.address(), "peer list led to agent");
                }
            }
        }
    }

    async fn remove_agent(&self, address: &str) {
        let client = {
            let mut registry = self.registry.write().await;
            registry.nodes.remove(address);
            registry.monitors.remove(address);
            registry.clients.remove(address)
        };
        if let Some(client) = client {
            client.close().await;
        }
        self.notify().await;
    }

    async fn snapshot(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.registry.read().await.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    async fn notify(&self) {
        let Some(updates) = &self.updates else {
            return;
        };
        match updates.try_send(self.snapshot().await) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("update channel full; snapshot dropped"),
            Err(TrySendError::Closed(_)) => debug!("update channel closed"),
        }
    }
}

async fn monitor_agent(
    shared: Arc<Shared>,
    address: String,
    handle: Arc<dyn AgentHandle>,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = shared.config.health_interval;
    let threshold = shared.config.failure_threshold.max(1);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => return,
        }

        match handle.resources().await {
            Ok(resources) => {
                failures = 0;
                {
                    let mut registry = shared.registry.write().await;
                    if let Some(node) = registry.nodes.get_mut(&address) {
                        node.resources = resources;
                        node.last_seen = epoch_secs();
                        node.status = NodeStatus::Online;
                    }
                }
                shared.notify().await;
            }
            Err(e) => {
                failures += 1;
                if failures >= threshold {
                    warn!(%address, error = %e, failures, "agent became unreachable");
                    shared.remove_agent(&address).await;
                    return;
                }
                debug!(%address, error = %e, failures, threshold, "agent health poll failed");
                {
                    let mut registry = shared.registry.write().await;
                    if let Some(node) = registry.nodes.get_mut(&address) {
                        node.status = NodeStatus::Offline;
                    }
                }
                shared.notify().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_port_are_split() {
        assert_eq!(split_host_port("agent:8082"), ("agent".to_string(), 8082));
        assert_eq!(split_host_port("10.0.0.5:9000"), ("10.0.0.5".to_string(), 9000));
        assert_eq!(split_host_port("[::1]:7000"), ("::1".to_string(), 7000));
    }

    #[test]
    fn port_falls_back_to_default() {
        assert_eq!(split_host_port("agent"), ("agent".to_string(), 8080));
        assert_eq!(split_host_port("agent:http"), ("agent".to_string(), 8080));
        assert_eq!(split_host_port("agent:"), ("agent".to_string(), 8080));
    }
}
