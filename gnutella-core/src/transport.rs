use async_trait::async_trait;

use crate::error::GnutellaError;
use crate::types::{MessageId, PeerId};

/// Everything a `SuperPeer`/`LeafPeer`/`Orchestrator` needs from the network.
///
/// The engine types in this crate depend only on this trait, never on a
/// concrete transport — `gnutella-node` supplies the production gRPC
/// implementation, and tests supply an in-process one that routes calls
/// directly between engine instances sharing an async runtime.
///
/// Methods the spec mandates as fire-and-forget (`query`, `queryHit`
/// forwarding, `end`) are plain synchronous methods: implementations spawn
/// their own task and must not block the caller, so a caller never awaits
/// them and never holds a lock across the dispatch.
#[async_trait]
pub trait PeerRpc: Send + Sync + 'static {
    /// Liveness probe, used by a leaf to wait out its super's startup race.
    async fn ping(&self, peer: PeerId) -> Result<(), GnutellaError>;

    /// Register `file_name` under `leaf_id` at `peer`'s index.
    async fn add(&self, peer: PeerId, leaf_id: PeerId, file_name: String)
        -> Result<(), GnutellaError>;

    /// Signal readiness: leaf -> its super, or super -> orchestrator.
    async fn ready(&self, peer: PeerId) -> Result<(), GnutellaError>;

    /// Signal request completion: leaf -> orchestrator.
    async fn complete(&self, peer: PeerId) -> Result<(), GnutellaError>;

    /// Release a leaf's pre-request barrier: orchestrator -> leaf.
    async fn start(&self, peer: PeerId) -> Result<(), GnutellaError>;

    /// Fetch a file's bytes from the leaf that holds it.
    async fn obtain(&self, peer: PeerId, file_name: String) -> Result<Vec<u8>, GnutellaError>;

    /// Fire-and-forget query flood/forward.
    fn query(&self, peer: PeerId, sender: PeerId, message_id: MessageId, ttl: u32, file_name: String);

    /// Fire-and-forget query-hit propagation.
    fn query_hit(
        &self,
        peer: PeerId,
        sender: PeerId,
        message_id: MessageId,
        ttl: u32,
        file_name: String,
        leaves: Vec<PeerId>,
    );

    /// Fire-and-forget terminate signal.
    fn end(&self, peer: PeerId);
}
