use std::sync::Arc;

use tonic::{Request, Response, Status};

use gnutella_core::leaf::LeafPeer;
use gnutella_core::orchestrator::Barrier;
use gnutella_core::super_peer::SuperPeer;
use gnutella_core::types::{MessageId, PeerId};

use crate::transport_grpc::GrpcTransport;

#[allow(clippy::enum_variant_names)]
pub mod proto {
    tonic::include_proto!("gnutella.v1");
}

use proto::peer_server::Peer;
use proto::*;

/// Orchestrator-side state reachable over gRPC: the ready/complete barriers
/// that supers and leaves report into.
pub struct OrchestratorState {
    pub ready: Barrier,
    pub complete: Barrier,
}

/// The role a bound `Peer` service plays. Each node process binds exactly
/// one of these; RPCs that don't apply to the bound role return
/// `UNIMPLEMENTED`, mirroring a single shared `.proto` service across
/// heterogeneous server roles.
pub enum NodeRole {
    Orchestrator(Arc<OrchestratorState>),
    Super(Arc<SuperPeer<GrpcTransport>>),
    Leaf(Arc<LeafPeer<GrpcTransport>>),
}

pub struct PeerService {
    pub role: NodeRole,
}

fn unimplemented(method: &str) -> Status {
    Status::unimplemented(format!("{method} not supported by this role"))
}

fn proto_to_message_id(id: Option<proto::MessageId>, fallback_sender: PeerId) -> MessageId {
    match id {
        Some(id) => MessageId {
            origin: PeerId(id.origin),
            sequence: id.sequence,
        },
        None => MessageId {
            origin: fallback_sender,
            sequence: 0,
        },
    }
}

#[tonic::async_trait]
impl Peer for PeerService {
    async fn ping(&self, _request: Request<PingRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Super(_) => Ok(Response::new(Empty {})),
            _ => Err(unimplemented("ping")),
        }
    }

    async fn add(&self, request: Request<AddRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Super(sp) => {
                let req = request.into_inner();
                sp.handle_add(PeerId(req.leaf_id), req.file_name);
                Ok(Response::new(Empty {}))
            }
            _ => Err(unimplemented("add")),
        }
    }

    async fn ready(&self, request: Request<ReadyRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Super(sp) => {
                sp.handle_ready_child().await;
                Ok(Response::new(Empty {}))
            }
            NodeRole::Orchestrator(state) => {
                let _ = request.into_inner().peer_id;
                state.ready.increment().await;
                Ok(Response::new(Empty {}))
            }
            _ => Err(unimplemented("ready")),
        }
    }

    async fn complete(&self, _request: Request<CompleteRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Orchestrator(state) => {
                state.complete.increment().await;
                Ok(Response::new(Empty {}))
            }
            _ => Err(unimplemented("complete")),
        }
    }

    async fn start(&self, _request: Request<StartRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Leaf(leaf) => {
                leaf.handle_start().await;
                Ok(Response::new(Empty {}))
            }
            _ => Err(unimplemented("start")),
        }
    }

    async fn obtain(&self, request: Request<ObtainRequest>) -> Result<Response<ObtainResponse>, Status> {
        match &self.role {
            NodeRole::Leaf(leaf) => {
                let file_name = request.into_inner().file_name;
                let bytes = leaf
                    .obtain_local(&file_name)
                    .map_err(|e| Status::not_found(e.to_string()))?;
                Ok(Response::new(ObtainResponse { bytes }))
            }
            _ => Err(unimplemented("obtain")),
        }
    }

    async fn query(&self, request: Request<QueryRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Super(sp) => {
                let req = request.into_inner();
                let sender = PeerId(req.sender);
                let message_id = proto_to_message_id(req.message_id, sender);
                sp.handle_query(sender, message_id, req.ttl, req.file_name);
                Ok(Response::new(Empty {}))
            }
            _ => Err(unimplemented("query")),
        }
    }

    async fn query_hit(&self, request: Request<QueryHitRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Super(sp) => {
                let req = request.into_inner();
                let sender = PeerId(req.sender);
                let message_id = proto_to_message_id(req.message_id, sender);
                sp.handle_query_hit(
                    sender,
                    message_id,
                    req.ttl,
                    req.file_name,
                    req.leaves.into_iter().map(PeerId).collect(),
                );
                Ok(Response::new(Empty {}))
            }
            NodeRole::Leaf(leaf) => {
                let req = request.into_inner();
                leaf.handle_query_hit(req.file_name, req.leaves.into_iter().map(PeerId).collect())
                    .await;
                Ok(Response::new(Empty {}))
            }
            _ => Err(unimplemented("query_hit")),
        }
    }

    async fn end(&self, _request: Request<EndRequest>) -> Result<Response<Empty>, Status> {
        match &self.role {
            NodeRole::Super(sp) => {
                sp.handle_end().await;
                Ok(Response::new(Empty {}))
            }
            NodeRole::Leaf(leaf) => {
                leaf.handle_end().await;
                Ok(Response::new(Empty {}))
            }
            _ => Err(unimplemented("end")),
        }
    }
}
