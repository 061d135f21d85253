use std::process::{Child, Command};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tonic::transport::Server;

use gnutella_core::orchestrator::{build_adjacency, generate_file_plan, Barrier};
use gnutella_core::transport::PeerRpc;
use gnutella_core::types::{PeerId, Topology, ORCHESTRATOR_ID};

use crate::cli::OrchestratorArgs;
use crate::grpc::proto::peer_server::PeerServer;
use crate::grpc::{NodeRole, OrchestratorState, PeerService};
use crate::transport_grpc::GrpcTransport;

pub async fn run(args: OrchestratorArgs) -> anyhow::Result<()> {
    let topology = Topology::try_from(args.topology).map_err(anyhow::Error::msg)?;
    let ttl = topology.initial_ttl(args.n_supers);
    let adjacency = build_adjacency(args.n_supers, topology);

    let n_leaves = args.n_supers * args.leaves_per_super;
    let mut rng = rand::rng();
    let plans = generate_file_plan(
        n_leaves,
        args.files_per_leaf,
        args.requests_per_leaf,
        args.duplication_factor,
        &mut rng,
    );

    tracing::info!(
        n_supers = args.n_supers,
        n_leaves,
        ?topology,
        ttl,
        "topology and file plan built"
    );

    let state = Arc::new(OrchestratorState {
        ready: Barrier::new(args.n_supers),
        complete: Barrier::new(n_leaves),
    });

    let addr = format!("0.0.0.0:{}", ORCHESTRATOR_ID.port())
        .parse()
        .context("invalid bind address")?;
    let service = PeerService {
        role: NodeRole::Orchestrator(state.clone()),
    };
    tokio::spawn(async move {
        let _ = Server::builder().add_service(PeerServer::new(service)).serve(addr).await;
    });

    let exe = std::env::current_exe().context("resolving current executable")?;
    let mut children: Vec<Child> = Vec::new();

    for super_id in 1..=args.n_supers {
        let neighbors = adjacency
            .get(&PeerId(super_id))
            .cloned()
            .unwrap_or_default();
        let neighbor_args = neighbors
            .iter()
            .map(|n| n.0.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let child = Command::new(&exe)
            .arg("super")
            .arg(super_id.to_string())
            .arg(args.n_supers.to_string())
            .arg(args.leaves_per_super.to_string())
            .arg("--neighbors")
            .arg(neighbor_args)
            .spawn()
            .with_context(|| format!("spawning super {super_id}"))?;
        children.push(child);
    }

    for (idx, plan) in plans.iter().enumerate() {
        let leaf_id = args.n_supers + 1 + idx as u32;
        let super_id = 1 + (idx as u32 / args.leaves_per_super);
        let child = Command::new(&exe)
            .arg("leaf")
            .arg(leaf_id.to_string())
            .arg(super_id.to_string())
            .arg(ttl.to_string())
            .arg("--initial-files")
            .arg(plan.initial_files.join(","))
            .arg("--request-files")
            .arg(plan.request_files.join(","))
            .spawn()
            .with_context(|| format!("spawning leaf {leaf_id}"))?;
        children.push(child);
    }

    state.ready.wait().await;
    tracing::info!("all supers ready, starting experiment");
    let start = Instant::now();

    let transport = GrpcTransport::new();
    for idx in 0..plans.len() {
        let leaf_id = PeerId(args.n_supers + 1 + idx as u32);
        transport.start(leaf_id).await.context("sending start to leaf")?;
    }

    state.complete.wait().await;
    let elapsed = start.elapsed();
    let total_requests: usize = plans.iter().map(|p| p.request_files.len()).sum();
    let throughput = total_requests as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    tracing::info!(total_requests, elapsed_secs = elapsed.as_secs_f64(), throughput, "experiment complete");
    println!("requests={total_requests} elapsed_secs={:.3} throughput={:.2}", elapsed.as_secs_f64(), throughput);

    for super_id in 1..=args.n_supers {
        transport.end(PeerId(super_id));
    }
    for idx in 0..plans.len() {
        transport.end(PeerId(args.n_supers + 1 + idx as u32));
    }
    // `end` is fire-and-forget; give it a moment to land before reaping children.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    for mut child in children {
        let _ = child.wait();
    }

    Ok(())
}
