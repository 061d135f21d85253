use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tonic::transport::Server;

use gnutella_core::leaf::LeafPeer;
use gnutella_core::storage::{generate_placeholder_bytes, leaf_dir, LeafStorage};
use gnutella_core::types::PeerId;

use crate::cli::LeafArgs;
use crate::grpc::proto::peer_server::PeerServer;
use crate::grpc::{NodeRole, PeerService};
use crate::transport_grpc::GrpcTransport;

fn non_empty(files: Vec<String>) -> Vec<String> {
    files.into_iter().filter(|f| !f.is_empty()).collect()
}

pub async fn run(args: LeafArgs) -> anyhow::Result<()> {
    let id = PeerId(args.id);
    let super_id = PeerId(args.super_id);
    let initial_files = non_empty(args.initial_files);
    let request_files = non_empty(args.request_files);

    tracing::info!(leaf_id = %id, super_id = %super_id, "booting leaf");

    let working_dir = PathBuf::from(".");
    let storage = LeafStorage::new(leaf_dir(&working_dir, id.0)).context("creating leaf storage")?;
    for file_name in &initial_files {
        let bytes = generate_placeholder_bytes(id.0, file_name);
        storage.write_file(file_name, &bytes).context("seeding initial file")?;
    }

    let transport = Arc::new(GrpcTransport::new());
    let leaf = Arc::new(LeafPeer::new(id, super_id, args.initial_ttl, storage, transport.clone()));

    let addr = format!("0.0.0.0:{}", id.port()).parse().context("invalid bind address")?;
    let service = PeerService {
        role: NodeRole::Leaf(leaf.clone()),
    };
    let server = tokio::spawn(async move {
        Server::builder()
            .add_service(PeerServer::new(service))
            .serve(addr)
            .await
    });

    // Race past the super's own socket-open delay with a retry-forever ping.
    loop {
        if leaf.ping_super().await.is_ok() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    tracing::info!(leaf_id = %id, "super reachable");

    for file_name in &initial_files {
        leaf.publish(file_name).await.context("publishing initial file")?;
    }
    leaf.signal_ready().await.context("signalling ready")?;

    leaf.wait_for_start().await;
    tracing::info!(leaf_id = %id, "issuing queries");
    leaf.issue_queries(&request_files).await;

    leaf.wait_until_complete().await;
    leaf.signal_complete().await.context("signalling complete")?;

    leaf.wait_for_end().await;
    tracing::info!(leaf_id = %id, "end received, shutting down");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    server.abort();
    Ok(())
}
