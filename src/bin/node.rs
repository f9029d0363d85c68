//! Node service binary

use clap::{Parser, Subcommand};
use groupsaga::{common::Config, NodeServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "groupsaga-node")]
#[command(about = "groupsaga node service with fault injection")]
struct Cli {
    /// Optional TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node service
    Serve {
        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<String>,

        /// Node tables to host (comma-separated)
        #[arg(long, value_delimiter = ',')]
        nodes: Vec<String>,

        /// Probability of a random 500/408 on /group requests
        #[arg(long)]
        failure_rate: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            nodes,
            failure_rate,
        } => {
            // CLI has priority over file and environment
            if let Some(bind) = bind {
                config.node_service.bind_addr = bind.parse()?;
            }
            if !nodes.is_empty() {
                config.node_service.nodes = nodes;
            }
            if let Some(rate) = failure_rate {
                config.node_service.failure_rate = rate;
            }
            config.validate()?;

            NodeServer::new(config.node_service).serve().await?;
        }
    }

    Ok(())
}
