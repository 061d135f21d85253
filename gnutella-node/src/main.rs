mod cli;
mod grpc;
mod run_leaf;
mod run_orchestrator;
mod run_super;
mod transport_grpc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main(worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Orchestrator(args) => run_orchestrator::run(args).await,
        Command::Super(args) => run_super::run(args).await,
        Command::Leaf(args) => run_leaf::run(args).await,
    }
}
