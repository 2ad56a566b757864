//! Agent mode: one cluster node.
//!
//! Startup order:
//! 1. Detect host resources and seed the broadcaster
//! 2. Start gossip membership and join through the configured seeds
//! 3. Forward broadcaster updates into gossip metadata
//! 4. Serve gRPC (node, discovery, console) and Prometheus over HTTP
//! 5. On Ctrl-C, leave the cluster and stop everything

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use llmesh_agent::{Broadcaster, StubEngine, detect_resources};
use llmesh_core::{AgentConfig, NodeStatus};
use llmesh_gossip::{GossipMembership, Membership, NodeMeta};
use llmesh_metrics::{MetricsCollector, MetricsHandle};
use llmesh_rpc::{ClusterView, RpcServer};

use crate::http::build_router;
use crate::settings::resolve_node_id;

/// Time allowed for the leave announcement on shutdown.
const LEAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the agent until Ctrl-C.
pub async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    config.validate()?;
    let node_id = resolve_node_id(&config)?;
    info!(%node_id, bind_port = config.bind_port, gossip_port = config.gossip_port, "llmesh agent starting");

    // ── Metrics ──────────────────────────────────────────────────
    let collector = Arc::new(MetricsCollector::new(node_id.clone()));
    let metrics = MetricsHandle::new(collector.clone());
    metrics.update_node_status(NodeStatus::Online);

    // ── Resources ────────────────────────────────────────────────
    let resources = detect_resources(config.max_layers, config.gpus.clone());
    metrics.update_node_resources(&resources);
    let broadcaster = Broadcaster::new(resources.clone()).with_metrics(metrics.clone());

    // ── Membership ───────────────────────────────────────────────
    let membership = Arc::new(
        GossipMembership::create(&node_id, config.bind_port as u32, config.gossip_port as u32)?
            .with_metrics(metrics.clone()),
    );
    membership
        .update_metadata(NodeMeta {
            resources,
            status: NodeStatus::Online,
        })
        .await?;
    membership
        .start(&config.seeds)
        .await
        .context("starting gossip membership")?;
    info!(members = membership.members().len(), "membership started");

    // ── Shutdown signal ──────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Resource announcements ───────────────────────────────────
    let mut updates = broadcaster.subscribe_channel(4).await;
    let gossip = membership.clone();
    let mut forward_shutdown = shutdown_rx.clone();
    let forward_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Some(resources) = update else { break };
                    let meta = NodeMeta { resources, status: NodeStatus::Online };
                    if let Err(e) = gossip.update_metadata(meta).await {
                        warn!(error = %e, "failed to publish resources to gossip");
                    }
                }
                _ = forward_shutdown.changed() => break,
            }
        }
    });
    let broadcast_handle = broadcaster.start(shutdown_rx.clone());

    // ── gRPC ─────────────────────────────────────────────────────
    let view = ClusterView::new(membership.clone(), broadcaster);
    let rpc = RpcServer::new(view, Arc::new(StubEngine::new(node_id.clone())))
        .with_metrics(metrics.clone());
    let rpc_addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    let listener = RpcServer::bind(rpc_addr).await?;
    info!(addr = %rpc_addr, "gRPC server starting");
    let rpc_shutdown = shutdown_rx.clone();
    let rpc_handle = tokio::spawn(async move {
        if let Err(e) = rpc.serve(listener, rpc_shutdown).await {
            error!(error = %e, "gRPC server error");
        }
    });

    // ── Prometheus ───────────────────────────────────────────────
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("binding metrics listener on {metrics_addr}"))?;
    info!(addr = %metrics_addr, "metrics server starting");
    let mut http_shutdown = shutdown_rx.clone();
    let http_handle = tokio::spawn(async move {
        let server = axum::serve(metrics_listener, build_router(collector)).with_graceful_shutdown(
            async move {
                let _ = http_shutdown.wait_for(|stop| *stop).await;
            },
        );
        if let Err(e) = server.await {
            error!(error = %e, "metrics server error");
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .context("installing Ctrl-C handler")?;
    info!("shutdown signal received");
    metrics.update_node_status(NodeStatus::Offline);

    if let Err(e) = membership.leave(LEAVE_TIMEOUT).await {
        warn!(error = %e, "leave announcement failed");
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = membership.stop().await {
        warn!(error = %e, "membership stop failed");
    }

    let _ = forward_handle.await;
    let _ = broadcast_handle.await;
    let _ = rpc_handle.await;
    let _ = http_handle.await;

    info!("agent stopped");
    Ok(())
}
