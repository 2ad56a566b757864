//! End-to-end tests: a real tonic server on localhost and `AgentClient`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use llmesh_agent::{Broadcaster, StubEngine};
use llmesh_core::{GpuInfo, Node, NodeStatus, ResourceInfo, epoch_secs};
use llmesh_gossip::{GossipResult, Member, MemberState, Membership, MembershipState, NodeMeta};
use llmesh_metrics::{MetricsCollector, MetricsHandle};
use llmesh_rpc::{AgentClient, CLUSTER_ID, ClusterView, RpcError, RpcServer, proto};

/// Membership with a fixed member list.
struct FixedMembership {
    local: String,
    members: Vec<Member>,
}

#[async_trait]
impl Membership for FixedMembership {
    fn local_id(&self) -> &str {
        &self.local
    }

    fn state(&self) -> MembershipState {
        MembershipState::Joined
    }

    async fn start(&self, _seeds: &[String]) -> GossipResult<()> {
        Ok(())
    }

    async fn join(&self, _seeds: &[String]) -> GossipResult<usize> {
        Ok(self.members.len())
    }

    async fn leave(&self, _timeout: Duration) -> GossipResult<()> {
        Ok(())
    }

    fn members(&self) -> Vec<Member> {
        self.members.clone()
    }

    async fn update_metadata(&self, _meta: NodeMeta) -> GossipResult<()> {
        Ok(())
    }

    async fn stop(&self) -> GossipResult<()> {
        Ok(())
    }
}

fn resources(max_layers: i32, used_layers: i32) -> ResourceInfo {
    ResourceInfo {
        cpu_cores: 8,
        memory_mb: 16384,
        gpus: vec![GpuInfo {
            name: "RTX 4090".into(),
            memory_mb: 24576,
            uuid: "gpu-0".into(),
        }],
        max_layers,
        used_layers,
    }
}

fn member(name: &str, rpc_port: u16, res: ResourceInfo) -> Member {
    Member {
        name: name.into(),
        addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 7946)),
        rpc_port,
        meta: NodeMeta {
            resources: res,
            status: NodeStatus::Online,
        },
        state: MemberState::Alive,
        incarnation: 0,
        last_seen: epoch_secs(),
    }
}

struct Harness {
    client: AgentClient,
    collector: Arc<MetricsCollector>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
}

async fn start_agent() -> Harness {
    let membership = Arc::new(FixedMembership {
        local: "node-a".into(),
        members: vec![
            member("node-a", 8080, resources(32, 16)),
            member("node-b", 8081, resources(64, 0)),
        ],
    });
    let broadcaster = Broadcaster::new(resources(32, 16));
    broadcaster
        .add_node(Node {
            id: "node-c".into(),
            address: "10.0.0.3".into(),
            port: 8082,
            status: NodeStatus::Busy,
            last_seen: epoch_secs(),
            ..Default::default()
        })
        .await;
    // Known to gossip already; must not be listed twice.
    broadcaster
        .add_node(Node {
            id: "node-b".into(),
            ..Default::default()
        })
        .await;

    let collector = Arc::new(MetricsCollector::new("node-a"));
    let view = ClusterView::new(membership, broadcaster);
    let server = RpcServer::new(view, Arc::new(StubEngine::new("node-a")))
        .with_metrics(MetricsHandle::new(collector.clone()));

    let listener = RpcServer::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(async move {
        server.serve(listener, shutdown_rx).await.unwrap();
    });

    let client = AgentClient::connect(&addr.to_string()).await.unwrap();
    Harness {
        client,
        collector,
        shutdown,
        server,
    }
}

impl Harness {
    async fn stop(self) {
        drop(self.client);
        self.shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .expect("server should stop")
            .unwrap();
    }
}

#[tokio::test]
async fn node_service_round_trip() {
    let h = start_agent().await;

    let res = h.client.resources().await.unwrap();
    assert_eq!(res.max_layers, 32);
    assert_eq!(res.used_layers, 16);
    assert_eq!(res.gpus.len(), 1);

    let health = h.client.health_check().await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.status, "running");

    let mut peers = h.client.peers().await.unwrap();
    peers.sort();
    assert_eq!(peers, vec!["10.0.0.3:8082", "127.0.0.1:8081"]);

    let metrics = h.client.node_metrics().await.unwrap();
    assert_eq!(metrics.node_id, "node-a");
    assert_eq!(metrics.available_layers, 16);
    assert_eq!(metrics.peer_count, 2);
    assert_eq!(metrics.status, "online");

    h.stop().await;
}

#[tokio::test]
async fn inference_goes_through_engine() {
    let h = start_agent().await;

    let resp = h
        .client
        .infer(proto::InferenceRequest {
            request_id: "req-1".into(),
            model_id: "llama-7b".into(),
            prompt: "hello".into(),
            max_tokens: 16,
        })
        .await
        .unwrap();
    assert!(resp.success);
    assert_eq!(resp.request_id, "req-1");
    assert_eq!(resp.generated_text, "Hello from node node-a");
    assert_eq!(resp.tokens_generated, 10);

    let err = h
        .client
        .infer(proto::InferenceRequest {
            request_id: "req-2".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    match err {
        RpcError::Status(status) => assert_eq!(status.code(), tonic::Code::InvalidArgument),
        other => panic!("unexpected error: {other}"),
    }

    let snap = h.collector.snapshot();
    let llama = snap
        .inference
        .iter()
        .find(|i| i.model_id == "llama-7b" && i.status == "success")
        .unwrap();
    assert_eq!(llama.requests, 1);
    assert_eq!(llama.tokens, 10);
    let rejected = snap
        .inference
        .iter()
        .find(|i| i.model_id == "default_model" && i.status == "error")
        .unwrap();
    assert_eq!(rejected.requests, 1);
    assert!(
        snap.latencies
            .iter()
            .any(|l| l.target == "grpc" && l.operation == "ProcessInference")
    );

    h.stop().await;
}

#[tokio::test]
async fn discovery_and_cluster_info() {
    let h = start_agent().await;

    let discovered = h.client.discover(vec!["node-b".into()]).await.unwrap();
    let mut ids: Vec<_> = discovered.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["node-a", "node-c"]);

    let info = h.client.cluster_info().await.unwrap();
    assert_eq!(info.cluster_id, CLUSTER_ID);
    assert_eq!(info.nodes.len(), 3);
    assert!(info.models.is_empty());
    let metrics = info.metrics.unwrap();
    assert_eq!(metrics.total_nodes, 3);
    assert_eq!(metrics.healthy_nodes, 2);
    assert_eq!(metrics.total_layers, 96);
    assert_eq!(metrics.allocated_layers, 16);
    assert!((metrics.cluster_utilization - 16.67).abs() < 0.01);

    h.stop().await;
}

#[tokio::test]
async fn console_lists_and_commands() {
    let h = start_agent().await;

    assert_eq!(h.client.nodes().await.unwrap().len(), 3);

    let models = h.client.models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "Llama 2 7B");

    let ping = h.client.execute_command("ping", vec![]).await.unwrap();
    assert_eq!(ping.output, "pong");
    let bad = h
        .client
        .execute_command("format", vec!["--all".into()])
        .await
        .unwrap();
    assert!(!bad.success);
    assert_eq!(bad.exit_code, 1);
    assert_eq!(bad.error, "Unknown command: format");

    h.stop().await;
}

#[tokio::test]
async fn update_stream_sends_one_update_per_type() {
    let h = start_agent().await;

    let mut stream = h
        .client
        .stream_updates(vec!["nodes".into(), "metrics".into()], 1)
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first.update_type, "nodes");
    assert_eq!(first.nodes.len(), 3);

    let second = tokio::time::timeout(Duration::from_secs(5), stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second.update_type, "metrics");
    assert_eq!(second.metrics.unwrap().total_nodes, 3);

    drop(stream);
    h.stop().await;
}

#[tokio::test]
async fn unknown_update_type_is_rejected() {
    let h = start_agent().await;

    let err = h
        .client
        .stream_updates(vec!["gpus".into()], 1)
        .await
        .unwrap_err();
    match err {
        RpcError::Status(status) => assert_eq!(status.code(), tonic::Code::InvalidArgument),
        other => panic!("unexpected error: {other}"),
    }

    h.stop().await;
}

#[tokio::test]
async fn metrics_stream_clamps_interval() {
    let h = start_agent().await;

    let mut stream = h.client.stream_metrics(0).await.unwrap();
    let started = tokio::time::Instant::now();
    for _ in 0..2 {
        let m = tokio::time::timeout(Duration::from_secs(5), stream.message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(m.node_id, "node-a");
    }
    // First push is immediate, the second one period (at least 1s) later.
    assert!(started.elapsed() >= Duration::from_millis(900));

    drop(stream);
    h.stop().await;
}
