use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::{Mutex, Notify};

use crate::storage::LeafStorage;
use crate::transport::PeerRpc;
use crate::types::{MessageId, PeerId};

/// State and request lifecycle for one leaf, per spec §4.3.
pub struct LeafPeer<T: PeerRpc> {
    pub id: PeerId,
    pub super_id: PeerId,
    pub initial_ttl: u32,
    storage: LeafStorage,
    transport: Arc<T>,
    next_message_id: AtomicU64,
    pending: Mutex<u32>,
    pending_notify: Notify,
    retrieved: Mutex<HashSet<String>>,
    started: Mutex<bool>,
    start_notify: Notify,
    ended: Mutex<bool>,
    end_notify: Notify,
}

impl<T: PeerRpc> LeafPeer<T> {
    pub fn new(id: PeerId, super_id: PeerId, initial_ttl: u32, storage: LeafStorage, transport: Arc<T>) -> Self {
        Self {
            id,
            super_id,
            initial_ttl,
            storage,
            transport,
            next_message_id: AtomicU64::new(0),
            pending: Mutex::new(0),
            pending_notify: Notify::new(),
            retrieved: Mutex::new(HashSet::new()),
            started: Mutex::new(false),
            start_notify: Notify::new(),
            ended: Mutex::new(false),
            end_notify: Notify::new(),
        }
    }

    pub fn storage(&self) -> &LeafStorage {
        &self.storage
    }

    /// Ping the parent super with a short timeout, retrying forever, until it
    /// answers — races past the super's own socket-open delay (spec §4.3,
    /// §5). The retry loop itself lives on the transport/caller side; this
    /// just performs one probe.
    pub async fn ping_super(&self) -> Result<(), crate::error::GnutellaError> {
        self.transport.ping(self.super_id).await
    }

    /// Publish one locally-held file to the parent super.
    pub async fn publish(&self, file_name: &str) -> Result<(), crate::error::GnutellaError> {
        self.transport.add(self.super_id, self.id, file_name.to_string()).await
    }

    pub async fn signal_ready(&self) -> Result<(), crate::error::GnutellaError> {
        self.transport.ready(self.super_id).await
    }

    /// `start()` handler: release the pre-request barrier.
    pub async fn handle_start(&self) {
        *self.started.lock().await = true;
        self.start_notify.notify_waiters();
    }

    pub async fn wait_for_start(&self) {
        loop {
            let notified = self.start_notify.notified();
            if *self.started.lock().await {
                return;
            }
            notified.await;
        }
    }

    /// Issue queries for every requested file. Each allocates a fresh
    /// `MessageId` and increments `pendingQueries` before firing the
    /// fire-and-forget `query` RPC to the parent super.
    pub async fn issue_queries(&self, file_names: &[String]) {
        for file_name in file_names {
            let message_id = MessageId {
                origin: self.id,
                sequence: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            };
            *self.pending.lock().await += 1;
            tracing::info!(leaf_id = %self.id, file = %file_name, %message_id, "querying");
            self.transport.query(
                self.super_id,
                self.id,
                message_id,
                self.initial_ttl,
                file_name.clone(),
            );
        }
    }

    /// `queryHit(sender, messageId, ttl, fileName, leaves)` handler.
    /// Deduplicates by `fileName`, then dispatches the download on a
    /// detached task so the handler returns immediately (spec §4.3, §9
    /// Open Question 1).
    pub async fn handle_query_hit(self: &Arc<Self>, file_name: String, leaves: Vec<PeerId>)
    where
        T: 'static,
    {
        let is_new = {
            let mut retrieved = self.retrieved.lock().await;
            if retrieved.contains(&file_name) {
                false
            } else {
                retrieved.insert(file_name.clone());
                true
            }
        };

        if !is_new {
            tracing::trace!(leaf_id = %self.id, file = %file_name, "dropping duplicate query hit");
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.download_file(file_name, leaves).await;
        });
    }

    /// Picks a random source among `leaves`, calls `obtain`, writes the
    /// bytes locally. Retries other sources (bounded by the candidate set
    /// size) on failure; if all fail, the file is unretrievable but
    /// `pendingQueries` is still decremented so the leaf can terminate
    /// (spec §9 Open Question 2).
    async fn download_file(&self, file_name: String, mut candidates: Vec<PeerId>) {
        candidates.shuffle(&mut rand::rng());

        let mut succeeded = false;
        for source in candidates {
            match self.transport.obtain(source, file_name.clone()).await {
                Ok(bytes) => match self.storage.write_file(&file_name, &bytes) {
                    Ok(()) => {
                        tracing::info!(leaf_id = %self.id, file = %file_name, source = %source, "downloaded");
                        succeeded = true;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(leaf_id = %self.id, file = %file_name, source = %source, error = %e, "write failed, retrying another source");
                    }
                },
                Err(e) => {
                    tracing::warn!(leaf_id = %self.id, file = %file_name, source = %source, error = %e, "obtain failed, retrying another source");
                }
            }
        }

        if !succeeded {
            tracing::warn!(leaf_id = %self.id, file = %file_name, "file unretrievable after exhausting all sources");
        }

        self.decrement_pending().await;
    }

    async fn decrement_pending(&self) {
        let mut count = self.pending.lock().await;
        *count -= 1;
        if *count == 0 {
            self.pending_notify.notify_waiters();
        }
    }

    /// Block until all issued queries have been fulfilled or given up on.
    pub async fn wait_until_complete(&self) {
        loop {
            let notified = self.pending_notify.notified();
            if *self.pending.lock().await == 0 {
                return;
            }
            notified.await;
        }
    }

    pub async fn signal_complete(&self) -> Result<(), crate::error::GnutellaError> {
        self.transport.complete(crate::types::ORCHESTRATOR_ID).await
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

    /// Returns the given file's bytes, or `NotFound` if this leaf never
    /// stored it. Backs the `obtain` RPC handler.
    pub fn obtain_local(&self, file_name: &str) -> Result<Vec<u8>, crate::error::GnutellaError> {
        self.storage.read_file(file_name)
    }

    #[cfg(test)]
    pub async fn pending_count(&self) -> u32 {
        *self.pending.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTransport;
    use tempfile::tempdir;

    fn peer(id: u32) -> PeerId {
        PeerId(id)
    }

    fn leaf_with_storage(dir: &std::path::Path) -> Arc<LeafPeer<RecordingTransport>> {
        let transport = Arc::new(RecordingTransport::default());
        let storage = LeafStorage::new(dir.join("leaf")).unwrap();
        Arc::new(LeafPeer::new(peer(3), peer(1), 2, storage, transport))
    }

    #[tokio::test]
    async fn issuing_a_query_increments_pending() {
        let dir = tempdir().unwrap();
        let leaf = leaf_with_storage(dir.path());

        leaf.issue_queries(&["5.txt".to_string(), "6.txt".to_string()]).await;
        assert_eq!(leaf.pending_count().await, 2);
    }

    #[tokio::test]
    async fn duplicate_query_hit_is_dropped() {
        let dir = tempdir().unwrap();
        let leaf = leaf_with_storage(dir.path());
        leaf.issue_queries(&["5.txt".to_string()]).await;

        leaf.handle_query_hit("5.txt".to_string(), vec![peer(10)]).await;
        leaf.handle_query_hit("5.txt".to_string(), vec![peer(11)]).await;

        // Only the first should have spawned a download; wait for it.
        leaf.wait_until_complete().await;
        assert_eq!(leaf.pending_count().await, 0);
    }

    #[tokio::test]
    async fn start_latch_releases_waiters() {
        let dir = tempdir().unwrap();
        let leaf = leaf_with_storage(dir.path());

        let waiter = leaf.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_start().await });
        tokio::task::yield_now().await;
        leaf.handle_start().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wait_until_complete_returns_immediately_with_nothing_pending() {
        let dir = tempdir().unwrap();
        let leaf = leaf_with_storage(dir.path());
        leaf.wait_until_complete().await;
    }
}
