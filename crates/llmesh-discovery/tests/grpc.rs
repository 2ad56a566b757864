//! Discovery over real gRPC against an in-process agent.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use llmesh_agent::{Broadcaster, StubEngine};
use llmesh_core::ResourceInfo;
use llmesh_discovery::{
    AgentConnector, AgentDiscovery, AgentHandle, DiscoveryConfig, DiscoveryStrategy, GrpcConnector,
};
use llmesh_gossip::GossipMembership;
use llmesh_rpc::{ClusterView, RpcServer};

async fn spawn_agent(max_layers: i32) -> (String, watch::Sender<bool>) {
    let membership = Arc::new(GossipMembership::create("agent-under-test", 18500, 18501).unwrap());
    let broadcaster = Broadcaster::new(ResourceInfo {
        cpu_cores: 2,
        memory_mb: 4096,
        max_layers,
        ..Default::default()
    });
    let server = RpcServer::new(
        ClusterView::new(membership, broadcaster),
        Arc::new(StubEngine::new("agent-under-test")),
    );
    let listener = RpcServer::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (shutdown, rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = server.serve(listener, rx).await;
    });
    (address, shutdown)
}

#[tokio::test]
async fn grpc_handle_reports_resources_and_closes() {
    let (address, shutdown) = spawn_agent(24).await;

    let handle = GrpcConnector.connect(&address).await.unwrap();
    assert_eq!(handle.address(), address);
    assert_eq!(handle.resources().await.unwrap().max_layers, 24);
    assert!(handle.peers().await.unwrap().is_empty());

    handle.close().await;
    assert!(handle.resources().await.is_err());

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn discovery_connects_over_grpc() {
    let (address, shutdown) = spawn_agent(12).await;

    let discovery = AgentDiscovery::grpc(DiscoveryConfig::new(DiscoveryStrategy::Static {
        seeds: vec![address.clone()],
    }));
    discovery.start().unwrap();

    let mut registered = false;
    for _ in 0..100 {
        if discovery.node_count().await == 1 {
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(registered);
    let node = &discovery.nodes().await[0];
    assert_eq!(node.id, format!("agent-{address}"));
    assert_eq!(node.address, "127.0.0.1");
    assert_eq!(node.resources.max_layers, 12);

    discovery.stop().await;
    let _ = shutdown.send(true);
}
