//! llmeshd — the llmesh daemon.
//!
//! # Usage
//!
//! ```text
//! llmeshd agent --node-id gpu-1 --bind-port 8080 --seed-nodes 10.0.0.2:7946
//! llmeshd console --k8s-namespace llm
//! llmeshd exec localhost:8080 status
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use llmeshd::logging::{LogFormat, init_tracing};
use llmeshd::settings::{AgentArgs, ConsoleArgs, load_config};

#[derive(Parser)]
#[command(name = "llmeshd", about = "llmesh distributed LLM cluster daemon")]
struct Cli {
    /// Path to llmesh.toml.
    #[arg(long, global = true, env = "LLMESH_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a cluster agent (gossip, gRPC, metrics).
    Agent(AgentArgs),

    /// Discover agents and log the node list.
    Console(ConsoleArgs),

    /// Run one console command against an agent.
    Exec {
        /// Agent address (host:port).
        address: String,

        /// Command name, e.g. `status` or `ping`.
        command: String,

        /// Command arguments.
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Agent(args) => {
            let config = load_config(cli.config.as_deref())?;
            llmeshd::agent::run_agent(args.apply(config.agent)).await
        }
        Command::Console(args) => {
            let config = load_config(cli.config.as_deref())?;
            llmeshd::console::run_console(args.apply(config.console)).await
        }
        Command::Exec {
            address,
            command,
            args,
        } => {
            let code = llmeshd::console::run_exec(&address, &command, args).await?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}
