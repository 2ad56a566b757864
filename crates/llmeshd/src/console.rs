//! Headless console: discover agents and log the node list as it changes.

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};

use llmesh_core::{ConsoleConfig, Node};
use llmesh_discovery::{AgentDiscovery, DiscoveryConfig, DiscoveryStrategy};
use llmesh_rpc::AgentClient;

/// Run console discovery until Ctrl-C.
pub async fn run_console(config: ConsoleConfig) -> anyhow::Result<()> {
    let strategy = DiscoveryStrategy::from_console(&config);
    info!(strategy = strategy.name(), "llmesh console starting");

    let (tx, mut rx) = mpsc::channel(config.update_buffer.max(1));
    let discovery = AgentDiscovery::grpc(DiscoveryConfig::new(strategy)).with_updates(tx);
    discovery.start()?;

    loop {
        tokio::select! {
            update = rx.recv() => {
                let Some(nodes) = update else { break };
                log_snapshot(&nodes);
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("installing Ctrl-C handler")?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    discovery.stop().await;
    info!("console stopped");
    Ok(())
}

fn log_snapshot(nodes: &[Node]) {
    info!(count = nodes.len(), "node list updated");
    for node in nodes {
        info!(
            node_id = %node.id,
            endpoint = %node.endpoint(),
            status = node.status.as_str(),
            layers = format!("{}/{}", node.resources.used_layers, node.resources.max_layers),
            "node"
        );
    }
}

/// Send one console command to `address` and print the result.
/// Returns the command's exit code.
pub async fn run_exec(address: &str, command: &str, args: Vec<String>) -> anyhow::Result<i32> {
    let client = AgentClient::connect(address)
        .await
        .with_context(|| format!("connecting to {address}"))?;
    let resp = client.execute_command(command, args).await?;
    if resp.success {
        println!("{}", resp.output);
    } else {
        warn!(command, exit_code = resp.exit_code, "command failed");
        eprintln!("{}", resp.error);
    }
    Ok(resp.exit_code)
}
