//! CLI: run group sagas against the configured nodes

use clap::{Parser, Subcommand};
use groupsaga::common::{parse_duration, Config, NodeTarget};
use groupsaga::coordinator::batch::{run_batch, sequential_ids, BatchReport};
use groupsaga::coordinator::{Coordinator, GroupOp, SagaOutcome};
use groupsaga::node::table::ClusterStats;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "groupsaga")]
#[command(about = "Create and delete group records consistently across nodes")]
#[command(version)]
struct Cli {
    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Node list override, `name=address` pairs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,

    /// Compensation retries
    #[arg(long)]
    max_retries: Option<usize>,

    /// Delay between compensation attempts (e.g. 100ms, 2s)
    #[arg(long)]
    retry_delay: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create one group on every node
    CreateOne {
        group_id: String,
    },

    /// Delete one group from every node
    DeleteOne {
        group_id: String,
    },

    /// Create groups "0".."count" in parallel
    Create {
        #[arg(long)]
        count: Option<usize>,

        #[arg(long)]
        workers: Option<usize>,
    },

    /// Delete groups "0".."count" in parallel
    Delete {
        #[arg(long)]
        count: Option<usize>,

        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show record counts and cross-node consistency
    Stats {
        /// Node whose address to query (defaults to the first node)
        #[arg(long)]
        node: Option<String>,
    },
}

fn parse_node(arg: &str) -> anyhow::Result<NodeTarget> {
    let (name, address) = arg
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected name=address, got {}", arg))?;
    Ok(NodeTarget::new(name.trim(), address.trim()))
}

fn print_outcome(op: GroupOp, group_id: &str, outcome: &SagaOutcome) {
    match outcome {
        SagaOutcome::Completed => println!("{} {}: completed on all nodes", op, group_id),
        SagaOutcome::Aborted { node, deleted_on } => println!(
            "{} {}: aborted, group absent on {} (already deleted on {:?})",
            op, group_id, node, deleted_on
        ),
        SagaOutcome::Compensated { failed_node } => println!(
            "{} {}: failed on {}, attempted nodes compensated",
            op, group_id, failed_node
        ),
    }
}

fn print_report(op: GroupOp, report: &BatchReport) {
    println!("Batch {} report:", op);
    println!("  Total: {}", report.total);
    println!("  Completed: {}", report.completed);
    println!("  Aborted: {}", report.aborted);
    println!("  Compensated: {}", report.compensated);
    println!("  Compensation exhausted: {}", report.exhausted.len());
    if !report.exhausted.is_empty() {
        println!("    {:?}", report.exhausted);
    }
    if !report.rejected.is_empty() {
        println!("  Rejected: {:?}", report.rejected);
    }
}

async fn run_many(
    config: &Config,
    op: GroupOp,
    count: Option<usize>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let count = count.unwrap_or(config.batch.count);
    let workers = workers.unwrap_or(config.batch.workers);
    println!("Trying to {} {} items", op, count);

    let coord = Coordinator::from_config(config)?;
    let report = run_batch(&coord, op, sequential_ids(count), workers).await;
    print_report(op, &report);
    Ok(())
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

    if !cli.nodes.is_empty() {
        config.nodes = cli
            .nodes
            .iter()
            .map(|arg| parse_node(arg))
            .collect::<anyhow::Result<_>>()?;
    }
    if let Some(retries) = cli.max_retries {
        config.saga.max_retries = retries;
    }
    if let Some(delay) = &cli.retry_delay {
        config.saga.retry_delay_ms = parse_duration(delay)?.as_millis() as u64;
    }
    config.validate()?;

    match cli.command {
        Commands::CreateOne { group_id } => {
            let coord = Coordinator::from_config(&config)?;
            let outcome = coord.create_group(&group_id).await?;
            print_outcome(GroupOp::Create, &group_id, &outcome);
        }

        Commands::DeleteOne { group_id } => {
            let coord = Coordinator::from_config(&config)?;
            let outcome = coord.delete_group(&group_id).await?;
            print_outcome(GroupOp::Delete, &group_id, &outcome);
        }

        Commands::Create { count, workers } => {
            run_many(&config, GroupOp::Create, count, workers).await?;
        }

        Commands::Delete { count, workers } => {
            run_many(&config, GroupOp::Delete, count, workers).await?;
        }

        Commands::Stats { node } => {
            let target = match node {
                Some(name) => config.node(&name)?.clone(),
                None => config.nodes[0].clone(),
            };
            let url = format!("{}/stats", target.address.trim_end_matches('/'));
            let stats: ClusterStats = reqwest::get(url).await?.error_for_status()?.json().await?;
            println!("Consistent: {}", stats.consistent);
            for (name, count) in &stats.counts {
                println!("  {}: {}", name, count);
            }
        }
    }

    Ok(())
}
