use std::sync::Arc;

use anyhow::Context;
use tonic::transport::Server;

use gnutella_core::super_peer::SuperPeer;
use gnutella_core::types::PeerId;

use crate::cli::SuperArgs;
use crate::grpc::proto::peer_server::PeerServer;
use crate::grpc::{NodeRole, PeerService};
use crate::transport_grpc::GrpcTransport;

pub async fn run(args: SuperArgs) -> anyhow::Result<()> {
    let id = PeerId(args.id);
    let neighbors: Vec<PeerId> = args.neighbors.into_iter().map(PeerId).collect();

    tracing::info!(super_id = %id, n_children = args.n_children, "booting super-peer");

    let transport = Arc::new(GrpcTransport::new());
    let super_peer = Arc::new(SuperPeer::new(id, args.n_supers, neighbors, args.n_children, transport));

    let addr = format!("0.0.0.0:{}", id.port()).parse().context("invalid bind address")?;
    let service = PeerService {
        role: NodeRole::Super(super_peer.clone()),
    };

    let serving = super_peer.clone();
    let server = tokio::spawn(async move {
        tracing::info!(super_id = %id, %addr, "serving");
        Server::builder()
            .add_service(PeerServer::new(service))
            .serve(addr)
            .await
    });

    serving.wait_for_end().await;
    tracing::info!(super_id = %id, "end received, shutting down");
    // Give the in-flight `end` response a moment to flush before the process exits.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    server.abort();
    Ok(())
}
