use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};

use crate::transport::PeerRpc;
use crate::types::{MessageId, PeerId, ORCHESTRATOR_ID};

/// State and flood-protocol logic for one super-peer.
///
/// `index` and `history` are `DashMap`s: per-key locking rather than one
/// coarse mutex (spec §9 explicitly allows either). The first-sighting
/// check-and-insert on `history` is performed under a single `entry()`
/// guard so it is atomic per message id — two concurrent arrivals of the
/// same `MessageId` are serialized against each other, but unrelated
/// message ids never contend.
pub struct SuperPeer<T: PeerRpc> {
    pub id: PeerId,
    pub n_supers: u32,
    pub neighbors: Vec<PeerId>,
    n_children: u32,
    index: DashMap<String, HashSet<PeerId>>,
    history: DashMap<MessageId, HashSet<PeerId>>,
    ready_count: Mutex<u32>,
    end_notify: Notify,
    ended: Mutex<bool>,
    transport: Arc<T>,
}

impl<T: PeerRpc> SuperPeer<T> {
    pub fn new(id: PeerId, n_supers: u32, neighbors: Vec<PeerId>, n_children: u32, transport: Arc<T>) -> Self {
        Self {
            id,
            n_supers,
            neighbors,
            n_children,
            index: DashMap::new(),
            history: DashMap::new(),
            ready_count: Mutex::new(0),
            end_notify: Notify::new(),
            ended: Mutex::new(false),
            transport,
        }
    }

    /// `add(leafId, fileName)` — idempotent registration.
    pub fn handle_add(&self, leaf_id: PeerId, file_name: String) {
        self.index.entry(file_name).or_default().insert(leaf_id);
    }

    /// A child leaf has signalled readiness; once all `n_children` have,
    /// forward readiness to the orchestrator.
    pub async fn handle_ready_child(&self) {
        let became_ready = {
            let mut count = self.ready_count.lock().await;
            *count += 1;
            *count == self.n_children
        };
        if became_ready {
            tracing::info!(super_id = %self.id, "children ready, signalling orchestrator");
            if let Err(e) = self.transport.ready(ORCHESTRATOR_ID).await {
                tracing::warn!(super_id = %self.id, error = %e, "failed to signal orchestrator readiness");
            }
        }
    }

    /// `query(senderId, messageId, ttl, fileName)` per spec §4.2.
    pub fn handle_query(&self, sender: PeerId, message_id: MessageId, ttl: u32, file_name: String) {
        let first_sighting = {
            let mut entry = self.history.entry(message_id).or_default();
            let first = entry.is_empty();
            entry.insert(sender);
            first
        };

        if first_sighting {
            if let Some(leaves) = self.index.get(&file_name) {
                let leaves: Vec<PeerId> = leaves.iter().copied().collect();
                tracing::debug!(super_id = %self.id, %message_id, file = %file_name, "index hit, replying");
                self.transport.query_hit(
                    sender,
                    self.id,
                    message_id,
                    self.n_supers,
                    file_name,
                    leaves,
                );
            } else if ttl.checked_sub(1).is_some_and(|t| t > 0) {
                tracing::debug!(super_id = %self.id, %message_id, file = %file_name, "forwarding to neighbors");
                for &neighbor in &self.neighbors {
                    if neighbor != sender {
                        self.transport
                            .query(neighbor, self.id, message_id, ttl - 1, file_name.clone());
                    }
                }
            }
        }
    }

    /// `queryHit(senderId, messageId, ttl, fileName, leaves)` per spec §4.2.
    pub fn handle_query_hit(
        &self,
        sender: PeerId,
        message_id: MessageId,
        ttl: u32,
        file_name: String,
        leaves: Vec<PeerId>,
    ) {
        let Some(query_senders) = self.history.get(&message_id) else {
            tracing::trace!(super_id = %self.id, %message_id, "dropping hit for unknown message id");
            return;
        };

        if ttl.checked_sub(1).is_some_and(|t| t > 0) {
            for &query_sender in query_senders.iter() {
                if query_sender != sender {
                    self.transport.query_hit(
                        query_sender,
                        self.id,
                        message_id,
                        ttl - 1,
                        file_name.clone(),
                        leaves.clone(),
                    );
                }
            }
        }
    }

    pub async fn handle_end(&self) {
        *self.ended.lock().await = true;
        self.end_notify.notify_waiters();
    }

    pub async fn wait_for_end(&self) {
        loop {
            let notified = self.end_notify.notified();
            if *self.ended.lock().await {
                return;
            }
            notified.await;
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn index_snapshot(&self, file_name: &str) -> Option<HashSet<PeerId>> {
        self.index.get(file_name).map(|v| v.clone())
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn history_len(&self, message_id: MessageId) -> usize {
        self.history.get(&message_id).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InProcessNetwork, RecordingTransport};

    fn peer(id: u32) -> PeerId {
        PeerId(id)
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 1, vec![], 0, transport);

        sp.handle_add(peer(10), "5.txt".to_string());
        sp.handle_add(peer(10), "5.txt".to_string());

        let leaves = sp.index_snapshot("5.txt").unwrap();
        assert_eq!(leaves.len(), 1);
        assert!(leaves.contains(&peer(10)));
    }

    #[tokio::test]
    async fn query_hit_short_circuits_forwarding() {
        // If the file is already indexed, the super must reply with a hit
        // and must NOT also forward the query to neighbors.
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 2, vec![peer(2)], 0, transport.clone());
        sp.handle_add(peer(10), "5.txt".to_string());

        let mid = MessageId { origin: peer(10), sequence: 0 };
        sp.handle_query(peer(10), mid, 2, "5.txt".to_string());

        assert_eq!(transport.query_hits_sent(), 1);
        assert_eq!(transport.queries_forwarded(), 0);
    }

    #[tokio::test]
    async fn query_forwards_on_miss_when_ttl_allows() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 2, vec![peer(2), peer(3)], 0, transport.clone());

        let mid = MessageId { origin: peer(10), sequence: 0 };
        sp.handle_query(peer(10), mid, 2, "missing.txt".to_string());

        // sender (10) isn't a neighbor, so both neighbors get the forward.
        assert_eq!(transport.queries_forwarded(), 2);
        assert_eq!(transport.query_hits_sent(), 0);
    }

    #[tokio::test]
    async fn query_does_not_forward_to_sender() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 2, vec![peer(2), peer(3)], 0, transport.clone());

        let mid = MessageId { origin: peer(10), sequence: 0 };
        // peer(2) is both a neighbor and the sender: should be excluded.
        sp.handle_query(peer(2), mid, 2, "missing.txt".to_string());

        assert_eq!(transport.queries_forwarded(), 1);
        assert_eq!(transport.forwarded_targets(), vec![peer(3)]);
    }

    #[tokio::test]
    async fn query_ttl_one_does_not_forward() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 2, vec![peer(2)], 0, transport.clone());

        let mid = MessageId { origin: peer(10), sequence: 0 };
        sp.handle_query(peer(10), mid, 1, "missing.txt".to_string());

        assert_eq!(transport.queries_forwarded(), 0);
    }

    #[tokio::test]
    async fn duplicate_query_is_recorded_but_not_reprocessed() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 2, vec![peer(2), peer(3)], 0, transport.clone());

        let mid = MessageId { origin: peer(10), sequence: 0 };
        sp.handle_query(peer(2), mid, 2, "missing.txt".to_string());
        sp.handle_query(peer(3), mid, 2, "missing.txt".to_string());

        // Only the first arrival forwards; the second is recorded as a
        // reverse-path candidate but does not re-forward.
        assert_eq!(transport.queries_forwarded(), 1);
        assert_eq!(sp.history_len(mid), 2);
    }

    #[tokio::test]
    async fn query_hit_routes_to_recorded_senders_except_immediate_one() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 3, vec![peer(2), peer(3), peer(4)], 0, transport.clone());

        let mid = MessageId { origin: peer(10), sequence: 0 };
        sp.handle_query(peer(2), mid, 3, "missing.txt".to_string());
        sp.handle_query(peer(3), mid, 3, "missing.txt".to_string());

        sp.handle_query_hit(peer(2), mid, 3, "missing.txt".to_string(), vec![peer(99)]);

        // history[mid] = {2, 3}; hit arrived from 2, so only 3 gets it.
        assert_eq!(transport.query_hits_targets(), vec![peer(3)]);
    }

    #[tokio::test]
    async fn query_hit_dropped_for_unknown_message_id() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 2, vec![peer(2)], 0, transport.clone());

        let mid = MessageId { origin: peer(10), sequence: 42 };
        sp.handle_query_hit(peer(2), mid, 3, "x.txt".to_string(), vec![peer(99)]);

        assert_eq!(transport.query_hits_targets().len(), 0);
    }

    #[tokio::test]
    async fn ready_signals_orchestrator_once_all_children_ready() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = SuperPeer::new(peer(1), 1, vec![], 2, transport.clone());

        sp.handle_ready_child().await;
        assert_eq!(transport.ready_signals(), 0);
        sp.handle_ready_child().await;
        assert_eq!(transport.ready_signals(), 1);
    }

    #[tokio::test]
    async fn end_latches_and_wakes_waiters() {
        let transport = Arc::new(RecordingTransport::default());
        let sp = Arc::new(SuperPeer::new(peer(1), 1, vec![], 0, transport));

        let waiter = sp.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_end().await });

        tokio::task::yield_now().await;
        sp.handle_end().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn single_hop_flood_across_two_supers() {
        // End-to-end scenario S1 over real SuperPeer instances wired by the
        // in-process network: a query for a file indexed on super 2 reaches
        // it from super 1 and the hit routes back.
        let net = InProcessNetwork::new();
        let s1 = net.add_super(peer(1), 2, vec![peer(2)], 1);
        let s2 = net.add_super(peer(2), 2, vec![peer(1)], 1);
        s2.handle_add(peer(3), "5.txt".to_string());

        let mid = MessageId { origin: peer(3), sequence: 0 };
        s1.handle_query(peer(3), mid, 2, "5.txt".to_string());
        // allow the chain of fire-and-forget spawns (forward, then reply) to run
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        let hits = net.hits_received_by(peer(3));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].2, vec![peer(3)]);
    }
}
