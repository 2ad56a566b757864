//! Gossip membership: the pluggable [`Membership`] interface and its
//! UDP implementation, [`GossipMembership`].
//!
//! Two tasks run per started node:
//!
//! ```text
//!   recv loop ── datagram ──▶ decode ──▶ MemberTable::merge ──▶ events/metrics
//!                                   └──▶ reply (Ack / JoinAck)
//!   gossip loop ── every gossip_interval ──▶ heartbeat, failure detection,
//!                                            push table to `fanout` peers,
//!                                            ping one peer
//! ```
//!
//! Both exit on the shutdown watch channel flipped by [`Membership::stop`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use llmesh_core::{Node, NodeStatus, epoch_secs};
use llmesh_metrics::{INCOMING, MetricsHandle, OUTGOING};

use crate::config::GossipConfig;
use crate::error::{GossipError, GossipResult};
use crate::message::{GossipMessage, MAX_DATAGRAM, MemberRecord, MemberState, NodeMeta};
use crate::table::{MemberTable, MergeOutcome};

/// Lifecycle of a membership instance. There is no way out of `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    Created,
    Started,
    Joined,
    Standalone,
    Stopped,
}

impl MembershipState {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            MembershipState::Started | MembershipState::Joined | MembershipState::Standalone
        )
    }
}

/// A cluster member as a plain value.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    /// Gossip address.
    pub addr: SocketAddr,
    pub rpc_port: u16,
    pub meta: NodeMeta,
    pub state: MemberState,
    pub incarnation: u64,
    /// Unix seconds when the member was last heard from.
    pub last_seen: u64,
}

impl Member {
    fn from_record(record: MemberRecord, last_seen: u64) -> Self {
        Self {
            name: record.name,
            addr: record.addr,
            rpc_port: record.rpc_port,
            meta: record.meta,
            state: record.state,
            incarnation: record.incarnation,
            last_seen,
        }
    }

    /// Project into the cluster data model. Suspect members report Offline.
    pub fn to_node(&self) -> Node {
        let status = match self.state {
            MemberState::Alive => self.meta.status,
            _ => NodeStatus::Offline,
        };
        Node {
            id: self.name.clone(),
            address: self.addr.ip().to_string(),
            port: self.rpc_port,
            resources: self.meta.resources.clone(),
            status,
            last_seen: self.last_seen,
        }
    }
}

/// Cluster membership capability set.
///
/// The RPC layer and the daemon only see `Arc<dyn Membership>`, so the
/// gossip algorithm underneath can be replaced.
#[async_trait]
pub trait Membership: Send + Sync {
    fn local_id(&self) -> &str;

    fn state(&self) -> MembershipState;

    /// Bind the gossip listener and, if `seeds` is non-empty, try to join
    /// through them. A failed join leaves the node running standalone.
    async fn start(&self, seeds: &[String]) -> GossipResult<()>;

    /// Contact `seeds` and wait for one of them to answer. Returns the
    /// number of live members afterwards.
    async fn join(&self, seeds: &[String]) -> GossipResult<usize>;

    /// Announce departure to every live peer within `timeout`.
    async fn leave(&self, timeout: Duration) -> GossipResult<()>;

    /// Live members including the local node. Empty unless running.
    fn members(&self) -> Vec<Member>;

    fn nodes(&self) -> Vec<Node> {
        self.members().iter().map(Member::to_node).collect()
    }

    /// Replace the metadata this node advertises.
    async fn update_metadata(&self, meta: NodeMeta) -> GossipResult<()>;

    /// Shut down background tasks. Idempotent and safe without `start`.
    async fn stop(&self) -> GossipResult<()>;
}

struct Shared {
    config: GossipConfig,
    metrics: MetricsHandle,
    table: Mutex<MemberTable>,
    /// Bumped on every JoinAck received.
    join_acks: watch::Sender<u64>,
    seq: AtomicU64,
}

struct Runtime {
    state: MembershipState,
    socket: Option<Arc<UdpSocket>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

/// SWIM-style gossip membership over UDP.
pub struct GossipMembership {
    shared: Arc<Shared>,
    runtime: Mutex<Runtime>,
}

impl GossipMembership {
    /// Validate inputs and build a membership with default timings.
    pub fn create(node_id: &str, bind_port: u32, gossip_port: u32) -> GossipResult<Self> {
        Self::create_with_config(GossipConfig::new(node_id, bind_port, gossip_port)?)
    }

    pub fn create_with_config(config: GossipConfig) -> GossipResult<Self> {
        config.validate()?;
        let local = MemberRecord {
            name: config.node_id.clone(),
            addr: SocketAddr::new(config.bind_addr, config.gossip_port),
            rpc_port: config.bind_port,
            meta: NodeMeta::default(),
            incarnation: 0,
            heartbeat: 0,
            state: MemberState::Alive,
        };
        let (join_acks, _) = watch::channel(0);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                metrics: MetricsHandle::disabled(),
                table: Mutex::new(MemberTable::new(local)),
                join_acks,
                seq: AtomicU64::new(0),
            }),
            runtime: Mutex::new(Runtime {
                state: MembershipState::Created,
                socket: None,
                shutdown_tx: None,
                tasks: Vec::new(),
            }),
        })
    }

    /// Attach a metrics reporter. Must be called before `start`.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.metrics = metrics,
            None => warn!("metrics attached after start; ignoring"),
        }
        self
    }

    pub fn config(&self) -> &GossipConfig {
        &self.shared.config
    }

    /// Address the gossip socket is bound to, once started.
    pub fn gossip_addr(&self) -> Option<SocketAddr> {
        lock(&self.runtime)
            .socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    fn socket(&self) -> GossipResult<Arc<UdpSocket>> {
        let rt = lock(&self.runtime);
        match rt.state {
            MembershipState::Created => Err(GossipError::NotStarted),
            MembershipState::Stopped => Err(GossipError::Stopped),
            _ => rt.socket.clone().ok_or(GossipError::NotStarted),
        }
    }

    fn set_state_if_running(&self, state: MembershipState) {
        let mut rt = lock(&self.runtime);
        if rt.state.is_running() {
            rt.state = state;
        }
    }
}

#[async_trait]
impl Membership for GossipMembership {
    fn local_id(&self) -> &str {
        &self.shared.config.node_id
    }

    fn state(&self) -> MembershipState {
        lock(&self.runtime).state
    }

    async fn start(&self, seeds: &[String]) -> GossipResult<()> {
        let started = Instant::now();
        {
            let mut rt = lock(&self.runtime);
            match rt.state {
                MembershipState::Created => rt.state = MembershipState::Started,
                MembershipState::Stopped => return Err(GossipError::Stopped),
                _ => return Err(GossipError::AlreadyStarted),
            }
        }

        let shared = &self.shared;
        let bind_addr = SocketAddr::new(shared.config.bind_addr, shared.config.gossip_port);
        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => Arc::new(socket),
            Err(source) => {
                shared.metrics.record_message(OUTGOING, "start_failed");
                let mut rt = lock(&self.runtime);
                if rt.state == MembershipState::Started {
                    rt.state = MembershipState::Created;
                }
                return Err(GossipError::Bind {
                    addr: bind_addr,
                    source,
                });
            }
        };
        if let Ok(addr) = socket.local_addr() {
            lock(&shared.table).set_local_addr(addr);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(recv_loop(shared.clone(), socket.clone(), shutdown_rx.clone())),
            tokio::spawn(gossip_loop(shared.clone(), socket.clone(), shutdown_rx)),
        ];

        {
            let mut rt = lock(&self.runtime);
            if rt.state == MembershipState::Stopped {
                let _ = shutdown_tx.send(true);
                for task in &tasks {
                    task.abort();
                }
                return Err(GossipError::Stopped);
            }
            rt.socket = Some(socket);
            rt.shutdown_tx = Some(shutdown_tx);
            rt.tasks = tasks;
        }

        let node_id = &shared.config.node_id;
        if seeds.is_empty() {
            self.set_state_if_running(MembershipState::Standalone);
        } else {
            match self.join(seeds).await {
                Ok(members) => {
                    info!(%node_id, ?seeds, members, "joined cluster");
                    shared.metrics.record_message(OUTGOING, "join_cluster_success");
                    self.set_state_if_running(MembershipState::Joined);
                }
                Err(e) => {
                    warn!(%node_id, ?seeds, error = %e, "failed to join cluster; running standalone");
                    shared.metrics.record_message(OUTGOING, "join_cluster_failed");
                    self.set_state_if_running(MembershipState::Standalone);
                }
            }
        }

        shared.metrics.record_message(OUTGOING, "start_success");
        shared
            .metrics
            .record_latency("local", "network_start", started.elapsed());
        shared
            .metrics
            .update_connection_count(lock(&shared.table).live_count());
        info!(%node_id, gossip_addr = %bind_addr, "gossip membership started");
        Ok(())
    }

    async fn join(&self, seeds: &[String]) -> GossipResult<usize> {
        let socket = self.socket()?;
        let shared = &self.shared;
        let mut acks = shared.join_acks.subscribe();
        let before = *acks.borrow_and_update();

        let request = GossipMessage::Join {
            from: shared.local_record(),
        }
        .encode()?;

        let mut sent = 0usize;
        for seed in seeds {
            let target = seed_with_port(seed, shared.config.gossip_port);
            let addrs = match tokio::net::lookup_host(target.as_str()).await {
                Ok(addrs) => addrs,
                Err(e) => {
                    debug!(%seed, error = %e, "failed to resolve seed");
                    continue;
                }
            };
            for addr in addrs {
                match socket.send_to(&request, addr).await {
                    Ok(_) => sent += 1,
                    Err(e) => debug!(%addr, error = %e, "join request send failed"),
                }
            }
        }
        if sent == 0 {
            return Err(GossipError::JoinFailed("no seed could be contacted".into()));
        }

        let timeout = shared.config.join_timeout;
        let answered = matches!(
            tokio::time::timeout(timeout, acks.wait_for(|n| *n > before)).await,
            Ok(Ok(_))
        );
        if !answered {
            return Err(GossipError::JoinFailed(format!(
                "no seed answered within {timeout:?}"
            )));
        }
        Ok(lock(&shared.table).live_count())
    }

    async fn leave(&self, timeout: Duration) -> GossipResult<()> {
        let socket = self.socket()?;
        let shared = &self.shared;
        let (record, peers) = {
            let mut table = lock(&shared.table);
            (table.mark_local_left(), table.peer_addrs())
        };
        let announce = GossipMessage::Gossip {
            from: record.clone(),
            members: vec![record],
        }
        .encode()?;

        let peer_count = peers.len();
        let send_all = async {
            for addr in peers {
                if let Err(e) = socket.send_to(&announce, addr).await {
                    debug!(%addr, error = %e, "leave announcement failed");
                }
            }
        };
        tokio::time::timeout(timeout, send_all)
            .await
            .map_err(|_| GossipError::LeaveTimeout(timeout))?;

        shared.metrics.record_message(OUTGOING, "leave");
        info!(node_id = %shared.config.node_id, peers = peer_count, "left cluster");
        Ok(())
    }

    fn members(&self) -> Vec<Member> {
        if !self.state().is_running() {
            return Vec::new();
        }
        let table = lock(&self.shared.table);
        let now = Instant::now();
        let epoch = epoch_secs();
        table
            .live_records()
            .into_iter()
            .map(|record| {
                let last_seen = match table.last_heard(&record.name) {
                    Some(at) => epoch.saturating_sub(now.saturating_duration_since(at).as_secs()),
                    None => epoch,
                };
                Member::from_record(record, last_seen)
            })
            .collect()
    }

    async fn update_metadata(&self, meta: NodeMeta) -> GossipResult<()> {
        let shared = &self.shared;
        let (push, targets) = {
            let mut table = lock(&shared.table);
            table.update_local_meta(meta);
            let targets = table.random_peers(shared.config.fanout, &mut rand::thread_rng());
            let push = GossipMessage::Gossip {
                from: table.local().clone(),
                members: vec![table.local().clone()],
            };
            (push, targets)
        };
        debug!(node_id = %shared.config.node_id, "local metadata updated");

        // Before start the new metadata simply rides along with the first round.
        if let Ok(socket) = self.socket() {
            shared.send_to_all(&socket, &push, &targets).await;
        }
        Ok(())
    }

    async fn stop(&self) -> GossipResult<()> {
        let (shutdown_tx, tasks) = {
            let mut rt = lock(&self.runtime);
            if rt.state == MembershipState::Stopped {
                return Ok(());
            }
            rt.state = MembershipState::Stopped;
            rt.socket = None;
            (rt.shutdown_tx.take(), std::mem::take(&mut rt.tasks))
        };

        if let Some(tx) = shutdown_tx {
            let _ = tx.send(true);
        }
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(1), task).await.is_err() {
                abort.abort();
            }
        }

        self.shared.metrics.update_connection_count(0);
        info!(node_id = %self.shared.config.node_id, "gossip membership stopped");
        Ok(())
    }
}

impl Shared {
    fn local_record(&self) -> MemberRecord {
        lock(&self.table).local().clone()
    }

    async fn handle(&self, mut msg: GossipMessage, src: SocketAddr, socket: &UdpSocket) {
        // Our own datagrams come back when a seed list points at ourselves.
        if msg.sender().name == self.config.node_id {
            return;
        }
        msg.sender_mut().addr = src;
        debug!(%src, kind = msg.kind(), "gossip message received");

        let now = Instant::now();
        let reply = {
            let mut table = lock(&self.table);
            let mut outcomes = Vec::new();
            let reply = match msg {
                GossipMessage::Ping { from, seq } => {
                    outcomes.push((from.name.clone(), table.merge(from, now)));
                    Some(GossipMessage::Ack {
                        from: table.local().clone(),
                        seq,
                    })
                }
                GossipMessage::Ack { from, .. } => {
                    outcomes.push((from.name.clone(), table.merge(from, now)));
                    None
                }
                GossipMessage::Join { from } => {
                    table.forget_tombstone(&from.name);
                    outcomes.push((from.name.clone(), table.merge(from, now)));
                    Some(GossipMessage::JoinAck {
                        from: table.local().clone(),
                        members: table.gossip_payload(),
                    })
                }
                GossipMessage::JoinAck { from, members } => {
                    outcomes.push((from.name.clone(), table.merge(from, now)));
                    for record in members {
                        outcomes.push((record.name.clone(), table.merge(record, now)));
                    }
                    self.join_acks.send_modify(|n| *n += 1);
                    None
                }
                GossipMessage::Gossip { from, members } => {
                    outcomes.push((from.name.clone(), table.merge(from, now)));
                    for record in members {
                        outcomes.push((record.name.clone(), table.merge(record, now)));
                    }
                    None
                }
            };
            let live = table.live_count();
            for (name, outcome) in outcomes {
                self.report(&name, outcome, live);
            }
            reply
        };

        if let Some(reply) = reply {
            self.send_to_all(socket, &reply, &[src]).await;
        }
    }

    /// One gossip round: heartbeat, failure detection, push, ping.
    async fn gossip_round(&self, socket: &UdpSocket) {
        let now = Instant::now();
        let (push, targets, ping, ping_target) = {
            let mut table = lock(&self.table);
            table.beat();

            let changes = table.tick(now, self.config.suspect_timeout, self.config.dead_timeout);
            let live = table.live_count();
            for (name, outcome) in changes {
                self.report(&name, outcome, live);
            }
            let purged = table.purge_tombstones(now, self.config.tombstone_ttl);
            if purged > 0 {
                debug!(purged, "expired tombstones");
            }

            let mut rng = rand::thread_rng();
            let targets = table.random_peers(self.config.fanout, &mut rng);
            let ping_target = table.random_peers(1, &mut rng).pop();
            let local = table.local().clone();
            let push = GossipMessage::Gossip {
                from: local.clone(),
                members: table.gossip_payload(),
            };
            let ping = GossipMessage::Ping {
                from: local,
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            };
            (push, targets, ping, ping_target)
        };

        self.send_to_all(socket, &push, &targets).await;
        if let Some(target) = ping_target {
            self.send_to_all(socket, &ping, &[target]).await;
        }
    }

    async fn send_to_all(&self, socket: &UdpSocket, msg: &GossipMessage, targets: &[SocketAddr]) {
        if targets.is_empty() {
            return;
        }
        let mut bytes = match msg.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind = msg.kind(), error = %e, "failed to encode gossip message");
                return;
            }
        };
        if bytes.len() > MAX_DATAGRAM {
            warn!(
                kind = msg.kind(),
                size = bytes.len(),
                "gossip payload exceeds datagram size; sending own record only"
            );
            let trimmed = GossipMessage::Gossip {
                from: msg.sender().clone(),
                members: Vec::new(),
            };
            bytes = match trimmed.encode() {
                Ok(bytes) => bytes,
                Err(_) => return,
            };
        }
        for addr in targets {
            if let Err(e) = socket.send_to(&bytes, addr).await {
                debug!(%addr, kind = msg.kind(), error = %e, "gossip send failed");
            }
        }
    }

    fn report(&self, name: &str, outcome: MergeOutcome, live: usize) {
        match outcome {
            MergeOutcome::Joined => {
                info!(member = %name, "node joined");
                self.metrics.record_message(INCOMING, "join");
                self.metrics.update_connection_count(live);
            }
            MergeOutcome::Left => {
                info!(member = %name, "node left");
                self.metrics.record_message(INCOMING, "leave");
                self.metrics.update_connection_count(live);
            }
            MergeOutcome::Updated => {
                info!(member = %name, "node updated");
                self.metrics.record_message(INCOMING, "update");
            }
            MergeOutcome::Suspected => warn!(member = %name, "node suspected"),
            MergeOutcome::Refuted => info!("refuted suspicion of local node"),
            MergeOutcome::Unchanged => {}
        }
    }
}

async fn recv_loop(shared: Arc<Shared>, socket: Arc<UdpSocket>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, src)) => match GossipMessage::decode(&buf[..len]) {
                    Ok(msg) => shared.handle(msg, src, &socket).await,
                    Err(e) => debug!(%src, error = %e, "dropping malformed gossip datagram"),
                },
                // ICMP port-unreachable surfaces here on some platforms.
                Err(e) => debug!(error = %e, "gossip receive failed"),
            },
            _ = shutdown.changed() => break,
        }
    }
    debug!("gossip receiver stopped");
}

async fn gossip_loop(shared: Arc<Shared>, socket: Arc<UdpSocket>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(shared.config.gossip_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => shared.gossip_round(&socket).await,
            _ = shutdown.changed() => break,
        }
    }
    debug!("gossip loop stopped");
}

/// Seeds may omit the port; the local gossip port is assumed then.
fn seed_with_port(seed: &str, default_port: u16) -> String {
    let has_port = seed
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        seed.to_string()
    } else {
        format!("{seed}:{default_port}")
    }
}

/// Member state must stay readable even if a task panicked mid-update.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
