use clap::{Args, Parser, Subcommand};

/// `gnutella-node` — orchestrator, super-peer, and leaf are all the same
/// binary; the subcommand selects which role this process plays.
#[derive(Parser)]
#[command(name = "gnutella-node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the topology, spawn children, gate the experiment, report throughput.
    Orchestrator(OrchestratorArgs),
    /// Internal: run as a super-peer. Spawned by the orchestrator.
    Super(SuperArgs),
    /// Internal: run as a leaf. Spawned by the orchestrator.
    Leaf(LeafArgs),
}

#[derive(Args)]
pub struct OrchestratorArgs {
    pub n_supers: u32,
    pub leaves_per_super: u32,
    pub files_per_leaf: u32,
    pub requests_per_leaf: u32,
    /// 0 = ALL_TO_ALL, 1 = LINEAR
    pub topology: u8,
    pub duplication_factor: u32,
}

#[derive(Args)]
pub struct SuperArgs {
    pub id: u32,
    pub n_supers: u32,
    pub n_children: u32,
    #[arg(long, value_delimiter = ',')]
    pub neighbors: Vec<u32>,
}

#[derive(Args)]
pub struct LeafArgs {
    pub id: u32,
    pub super_id: u32,
    pub initial_ttl: u32,
    #[arg(long, value_delimiter = ',', default_value = "")]
    pub initial_files: Vec<String>,
    #[arg(long, value_delimiter = ',', default_value = "")]
    pub request_files: Vec<String>,
}
