use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tonic::transport::Channel;

use gnutella_core::error::GnutellaError;
use gnutella_core::transport::PeerRpc;
use gnutella_core::types::{MessageId, PeerId};

use crate::grpc::proto;
use crate::grpc::proto::peer_client::PeerClient;

/// Production [`PeerRpc`] implementation: every method dials out over gRPC.
/// Clients are cached per remote peer behind a single lock, write-once —
/// mirroring `bpmn-lite`'s single-connection-per-target style, generalized
/// to many remotes instead of one fixed server address.
pub struct GrpcTransport {
    clients: Arc<Mutex<HashMap<PeerId, PeerClient<Channel>>>>,
}

impl GrpcTransport {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn client_for(&self, peer: PeerId) -> Result<PeerClient<Channel>, GnutellaError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&peer) {
            return Ok(client.clone());
        }
        let endpoint = format!("http://127.0.0.1:{}", peer.port());
        let client = PeerClient::connect(endpoint)
            .await
            .map_err(|e| GnutellaError::Transport(format!("dialing peer {peer}: {e}")))?;
        clients.insert(peer, client.clone());
        Ok(client)
    }

    async fn dial(clients: &Arc<Mutex<HashMap<PeerId, PeerClient<Channel>>>>, peer: PeerId) -> Option<PeerClient<Channel>> {
        let mut clients = clients.lock().await;
        if let Some(client) = clients.get(&peer) {
            return Some(client.clone());
        }
        let endpoint = format!("http://127.0.0.1:{}", peer.port());
        match PeerClient::connect(endpoint).await {
            Ok(client) => {
                clients.insert(peer, client.clone());
                Some(client)
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "failed to dial peer");
                None
            }
        }
    }
}

impl Default for GrpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn status_to_err(peer: PeerId, status: tonic::Status) -> GnutellaError {
    GnutellaError::Transport(format!("peer {peer} returned {status}"))
}

fn message_id_to_proto(id: MessageId) -> proto::MessageId {
    proto::MessageId {
        origin: id.origin.0,
        sequence: id.sequence,
    }
}

#[async_trait]
impl PeerRpc for GrpcTransport {
    async fn ping(&self, peer: PeerId) -> Result<(), GnutellaError> {
        let mut client = self.client_for(peer).await?;
        client
            .ping(proto::PingRequest {})
            .await
            .map_err(|e| status_to_err(peer, e))?;
        Ok(())
    }

    async fn add(&self, peer: PeerId, leaf_id: PeerId, file_name: String) -> Result<(), GnutellaError> {
        let mut client = self.client_for(peer).await?;
        client
            .add(proto::AddRequest { leaf_id: leaf_id.0, file_name })
            .await
            .map_err(|e| status_to_err(peer, e))?;
        Ok(())
    }

    async fn ready(&self, peer: PeerId) -> Result<(), GnutellaError> {
        let mut client = self.client_for(peer).await?;
        client
            .ready(proto::ReadyRequest { peer_id: peer.0 })
            .await
            .map_err(|e| status_to_err(peer, e))?;
        Ok(())
    }

    async fn complete(&self, peer: PeerId) -> Result<(), GnutellaError> {
        let mut client = self.client_for(peer).await?;
        client
            .complete(proto::CompleteRequest { peer_id: peer.0 })
            .await
            .map_err(|e| status_to_err(peer, e))?;
        Ok(())
    }

    async fn start(&self, peer: PeerId) -> Result<(), GnutellaError> {
        let mut client = self.client_for(peer).await?;
        client
            .start(proto::StartRequest {})
            .await
            .map_err(|e| status_to_err(peer, e))?;
        Ok(())
    }

    async fn obtain(&self, peer: PeerId, file_name: String) -> Result<Vec<u8>, GnutellaError> {
        let mut client = self.client_for(peer).await?;
        let resp = client
            .obtain(proto::ObtainRequest { file_name })
            .await
            .map_err(|e| status_to_err(peer, e))?;
        Ok(resp.into_inner().bytes)
    }

    fn query(&self, peer: PeerId, sender: PeerId, message_id: MessageId, ttl: u32, file_name: String) {
        let clients = self.clients.clone();
        tokio::spawn(async move {
            let Some(mut client) = Self::dial(&clients, peer).await else { return };
            if let Err(e) = client
                .query(proto::QueryRequest {
                    sender: sender.0,
                    message_id: Some(message_id_to_proto(message_id)),
                    ttl,
                    file_name,
                })
                .await
            {
                tracing::warn!(%peer, error = %e, "query RPC failed");
            }
        });
    }

    fn query_hit(
        &self,
        peer: PeerId,
        sender: PeerId,
        message_id: MessageId,
        ttl: u32,
        file_name: String,
        leaves: Vec<PeerId>,
    ) {
        let clients = self.clients.clone();
        tokio::spawn(async move {
            let Some(mut client) = Self::dial(&clients, peer).await else { return };
            if let Err(e) = client
                .query_hit(proto::QueryHitRequest {
                    sender: sender.0,
                    message_id: Some(message_id_to_proto(message_id)),
                    ttl,
                    file_name,
                    leaves: leaves.into_iter().map(|p| p.0).collect(),
                })
                .await
            {
                tracing::warn!(%peer, error = %e, "query_hit RPC failed");
            }
        });
    }

    fn end(&self, peer: PeerId) {
        let clients = self.clients.clone();
        tokio::spawn(async move {
            let Some(mut client) = Self::dial(&clients, peer).await else { return };
            if let Err(e) = client.end(proto::EndRequest {}).await {
                tracing::warn!(%peer, error = %e, "end RPC failed");
            }
        });
    }
}
