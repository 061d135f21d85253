//! In-process transport doubles shared by this crate's unit tests.
//!
//! `RecordingTransport` never touches another peer — it just records what
//! was dispatched, for assertions against a single `SuperPeer`/`LeafPeer` in
//! isolation. `InProcessNetwork` wires several real `SuperPeer` instances
//! together over a shared async runtime, so multi-hop flood scenarios can be
//! exercised without any sockets.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::GnutellaError;
use crate::leaf::LeafPeer;
use crate::super_peer::SuperPeer;
use crate::transport::PeerRpc;
use crate::types::{MessageId, PeerId};

#[derive(Default)]
pub struct RecordingTransport {
    forwarded: Mutex<Vec<(PeerId, String)>>,
    query_hits: Mutex<Vec<(PeerId, String, Vec<PeerId>)>>,
    ready_signals: Mutex<u32>,
}

impl RecordingTransport {
    pub fn queries_forwarded(&self) -> usize {
        self.forwarded.lock().unwrap().len()
    }

    pub fn forwarded_targets(&self) -> Vec<PeerId> {
        self.forwarded.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn query_hits_sent(&self) -> usize {
        self.query_hits.lock().unwrap().len()
    }

    pub fn query_hits_targets(&self) -> Vec<PeerId> {
        self.query_hits.lock().unwrap().iter().map(|(p, _, _)| *p).collect()
    }

    pub fn ready_signals(&self) -> u32 {
        *self.ready_signals.lock().unwrap()
    }
}

#[async_trait]
impl PeerRpc for RecordingTransport {
    async fn ping(&self, _peer: PeerId) -> Result<(), GnutellaError> {
        Ok(())
    }

    async fn add(&self, _peer: PeerId, _leaf_id: PeerId, _file_name: String) -> Result<(), GnutellaError> {
        Ok(())
    }

    async fn ready(&self, _peer: PeerId) -> Result<(), GnutellaError> {
        *self.ready_signals.lock().unwrap() += 1;
        Ok(())
    }

    async fn complete(&self, _peer: PeerId) -> Result<(), GnutellaError> {
        Ok(())
    }

    async fn start(&self, _peer: PeerId) -> Result<(), GnutellaError> {
        Ok(())
    }

    async fn obtain(&self, _peer: PeerId, _file_name: String) -> Result<Vec<u8>, GnutellaError> {
        Ok(vec![])
    }

    fn query(&self, peer: PeerId, _sender: PeerId, _message_id: MessageId, _ttl: u32, file_name: String) {
        self.forwarded.lock().unwrap().push((peer, file_name));
    }

    fn query_hit(
        &self,
        peer: PeerId,
        _sender: PeerId,
        _message_id: MessageId,
        _ttl: u32,
        file_name: String,
        leaves: Vec<PeerId>,
    ) {
        self.query_hits.lock().unwrap().push((peer, file_name, leaves));
    }

    fn end(&self, _peer: PeerId) {}
}

/// Wires real `SuperPeer`s and `LeafPeer`s together without sockets, so
/// multi-hop flood and end-to-end download scenarios can be exercised over
/// the real engine types. Calls aimed at a peer id registered as neither
/// land in `hits_log`, so tests can still assert on raw traffic if needed.
pub struct InProcessNetwork {
    transport: Arc<InProcessTransport>,
}

pub struct InProcessTransport {
    supers: Arc<DashMap<PeerId, Arc<SuperPeer<InProcessTransport>>>>,
    leaves: Arc<DashMap<PeerId, Arc<LeafPeer<InProcessTransport>>>>,
    hits_log: DashMap<PeerId, Vec<(PeerId, String, Vec<PeerId>)>>,
}

impl InProcessNetwork {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(InProcessTransport {
                supers: Arc::new(DashMap::new()),
                leaves: Arc::new(DashMap::new()),
                hits_log: DashMap::new(),
            }),
        }
    }

    pub fn add_super(
        &self,
        id: PeerId,
        n_supers: u32,
        neighbors: Vec<PeerId>,
        n_children: u32,
    ) -> Arc<SuperPeer<InProcessTransport>> {
        let sp = Arc::new(SuperPeer::new(id, n_supers, neighbors, n_children, self.transport.clone()));
        self.transport.supers.insert(id, sp.clone());
        sp
    }

    pub fn add_leaf(
        &self,
        id: PeerId,
        super_id: PeerId,
        initial_ttl: u32,
        storage: crate::storage::LeafStorage,
    ) -> Arc<LeafPeer<InProcessTransport>> {
        let leaf = Arc::new(LeafPeer::new(id, super_id, initial_ttl, storage, self.transport.clone()));
        self.transport.leaves.insert(id, leaf.clone());
        leaf
    }

    pub fn hits_received_by(&self, leaf_id: PeerId) -> Vec<(PeerId, String, Vec<PeerId>)> {
        self.transport
            .hits_log
            .get(&leaf_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl Default for InProcessNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerRpc for InProcessTransport {
    async fn ping(&self, _peer: PeerId) -> Result<(), GnutellaError> {
        Ok(())
    }

    async fn add(&self, peer: PeerId, leaf_id: PeerId, file_name: String) -> Result<(), GnutellaError> {
        if let Some(sp) = self.supers.get(&peer) {
            sp.handle_add(leaf_id, file_name);
        }
        Ok(())
    }

    async fn ready(&self, peer: PeerId) -> Result<(), GnutellaError> {
        if let Some(sp) = self.supers.get(&peer) {
            sp.handle_ready_child().await;
        }
        Ok(())
    }

    async fn complete(&self, _peer: PeerId) -> Result<(), GnutellaError> {
        Ok(())
    }

    async fn start(&self, peer: PeerId) -> Result<(), GnutellaError> {
        if let Some(leaf) = self.leaves.get(&peer) {
            leaf.handle_start().await;
        }
        Ok(())
    }

    async fn obtain(&self, peer: PeerId, file_name: String) -> Result<Vec<u8>, GnutellaError> {
        match self.leaves.get(&peer) {
            Some(leaf) => leaf.obtain_local(&file_name),
            None => Err(GnutellaError::NotFound(file_name)),
        }
    }

    fn query(&self, peer: PeerId, sender: PeerId, message_id: MessageId, ttl: u32, file_name: String) {
        let supers = self.supers.clone();
        tokio::spawn(async move {
            if let Some(sp) = supers.get(&peer) {
                sp.handle_query(sender, message_id, ttl, file_name);
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
        leaves_arg: Vec<PeerId>,
    ) {
        if let Some(sp) = self.supers.get(&peer) {
            let sp = sp.clone();
            tokio::spawn(async move {
                sp.handle_query_hit(sender, message_id, ttl, file_name, leaves_arg);
            });
        } else if let Some(leaf) = self.leaves.get(&peer) {
            let leaf = leaf.clone();
            tokio::spawn(async move {
                leaf.handle_query_hit(file_name, leaves_arg).await;
            });
        } else {
            self.hits_log
                .entry(peer)
                .or_default()
                .push((sender, file_name, leaves_arg));
        }
    }

    fn end(&self, _peer: PeerId) {}
}
