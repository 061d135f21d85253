//! End-to-end flood-protocol scenarios (S1-S6) run over real `SuperPeer`/
//! `LeafPeer` instances wired by `InProcessNetwork` — no sockets, no spawned
//! processes, just the engine and its protocol.

use std::collections::HashSet;
use std::time::Duration;

use gnutella_core::storage::LeafStorage;
use gnutella_core::test_support::InProcessNetwork;
use gnutella_core::types::PeerId;

fn peer(id: u32) -> PeerId {
    PeerId(id)
}

async fn yield_many() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// S1: single hop hit over a LINEAR two-super overlay.
#[tokio::test]
async fn s1_single_hop_hit() {
    let dir = tempfile::tempdir().unwrap();
    let net = InProcessNetwork::new();

    net.add_super(peer(1), 2, vec![peer(2)], 1);
    net.add_super(peer(2), 2, vec![peer(1)], 1);

    let storage_l2 = LeafStorage::new(dir.path().join("Leaf 2")).unwrap();
    storage_l2.write_file("5.txt", b"hello from leaf 2").unwrap();
    let l2 = net.add_leaf(peer(2), peer(1), 2, storage_l2);
    l2.publish("5.txt").await.unwrap();

    let storage_l3 = LeafStorage::new(dir.path().join("Leaf 3")).unwrap();
    let l3 = net.add_leaf(peer(3), peer(2), 2, storage_l3);
    l3.issue_queries(&["5.txt".to_string()]).await;

    l3.wait_until_complete().await;

    let bytes = l3.obtain_local("5.txt").unwrap();
    assert_eq!(bytes, b"hello from leaf 2");
}

/// S2: loop suppression over an ALL_TO_ALL three-super overlay — the
/// requester still gets exactly one successful download despite redundant
/// paths between the supers.
#[tokio::test]
async fn s2_loop_suppression_all_to_all() {
    let dir = tempfile::tempdir().unwrap();
    let net = InProcessNetwork::new();

    net.add_super(peer(1), 3, vec![peer(2), peer(3)], 1);
    net.add_super(peer(2), 3, vec![peer(1), peer(3)], 1);
    let s3 = net.add_super(peer(3), 3, vec![peer(1), peer(2)], 1);

    let storage_holder = LeafStorage::new(dir.path().join("Leaf holder")).unwrap();
    storage_holder.write_file("9.txt", b"only one copy").unwrap();
    let holder = net.add_leaf(peer(10), peer(3), 2, storage_holder);
    holder.publish("9.txt").await.unwrap();

    let storage_req = LeafStorage::new(dir.path().join("Leaf requester")).unwrap();
    let requester = net.add_leaf(peer(11), peer(1), 2, storage_req);
    requester.issue_queries(&["9.txt".to_string()]).await;

    requester.wait_until_complete().await;

    assert_eq!(requester.obtain_local("9.txt").unwrap(), b"only one copy");
    // s3 holds the index entry and should have forwarded the query to its
    // neighbors at most once per messageId, despite receiving it via two
    // redundant paths (1->3 direct, 1->2->3).
    assert!(s3.history_len(gnutella_core::types::MessageId { origin: peer(11), sequence: 0 }) >= 1);
}

/// S3: a query for a file nobody holds never completes — confirmed with a
/// time bound, since the protocol has no negative acknowledgment.
#[tokio::test]
async fn s3_miss_never_completes() {
    let dir = tempfile::tempdir().unwrap();
    let net = InProcessNetwork::new();

    net.add_super(peer(1), 2, vec![peer(2)], 1);
    net.add_super(peer(2), 2, vec![peer(1)], 1);

    let storage = LeafStorage::new(dir.path().join("Leaf requester")).unwrap();
    let requester = net.add_leaf(peer(3), peer(1), 2, storage);
    requester.issue_queries(&["missing.txt".to_string()]).await;

    let result = tokio::time::timeout(Duration::from_millis(200), requester.wait_until_complete()).await;
    assert!(result.is_err(), "a miss must never complete");
}

/// S4: a file held by three leaves — exactly one download completes, and
/// across many trials the source isn't always the same leaf.
#[tokio::test]
async fn s4_multi_holder_random_pick() {
    let mut sources_used = HashSet::new();

    for trial in 0..20u32 {
        let dir = tempfile::tempdir().unwrap();
        let net = InProcessNetwork::new();
        net.add_super(peer(1), 1, vec![], 4);

        let mut holder_bytes = Vec::new();
        for (idx, holder_id) in [10u32, 11, 12].into_iter().enumerate() {
            let storage = LeafStorage::new(dir.path().join(format!("Leaf {holder_id}"))).unwrap();
            let bytes = format!("copy from holder {holder_id} trial {trial}").into_bytes();
            storage.write_file("7.txt", &bytes).unwrap();
            let leaf = net.add_leaf(peer(holder_id), peer(1), 2, storage);
            leaf.publish("7.txt").await.unwrap();
            if idx == 0 {
                holder_bytes = bytes;
            }
        }

        let storage_req = LeafStorage::new(dir.path().join("Leaf requester")).unwrap();
        let requester = net.add_leaf(peer(20), peer(1), 2, storage_req);
        requester.issue_queries(&["7.txt".to_string()]).await;
        requester.wait_until_complete().await;

        let bytes = requester.obtain_local("7.txt").unwrap();
        assert!(bytes.starts_with(b"copy from holder"));
        let _ = &holder_bytes;

        let source = String::from_utf8(bytes).unwrap();
        sources_used.insert(source.split_whitespace().nth(3).unwrap().to_string());
    }

    assert!(sources_used.len() > 1, "random source selection should vary across trials");
}

/// S5: a five-super LINEAR chain with TTL == diameter still reaches the far
/// end.
#[tokio::test]
async fn s5_linear_chain_reach() {
    let dir = tempfile::tempdir().unwrap();
    let net = InProcessNetwork::new();

    for id in 1..=5u32 {
        let mut neighbors = Vec::new();
        if id > 1 {
            neighbors.push(peer(id - 1));
        }
        if id < 5 {
            neighbors.push(peer(id + 1));
        }
        net.add_super(peer(id), 5, neighbors, 1);
    }

    let storage_holder = LeafStorage::new(dir.path().join("Leaf holder")).unwrap();
    storage_holder.write_file("far.txt", b"reached across the chain").unwrap();
    let holder = net.add_leaf(peer(100), peer(5), 5, storage_holder);
    holder.publish("far.txt").await.unwrap();

    let storage_req = LeafStorage::new(dir.path().join("Leaf requester")).unwrap();
    let requester = net.add_leaf(peer(101), peer(1), 5, storage_req);
    requester.issue_queries(&["far.txt".to_string()]).await;

    requester.wait_until_complete().await;
    assert_eq!(requester.obtain_local("far.txt").unwrap(), b"reached across the chain");
}

/// S6: publishing the same file twice via `add` leaves the index entry
/// recorded exactly once.
#[tokio::test]
async fn s6_idempotent_add() {
    let dir = tempfile::tempdir().unwrap();
    let net = InProcessNetwork::new();
    let sp = net.add_super(peer(1), 1, vec![], 1);

    let storage = LeafStorage::new(dir.path().join("Leaf 2")).unwrap();
    storage.write_file("5.txt", b"x").unwrap();
    let leaf = net.add_leaf(peer(2), peer(1), 1, storage);

    leaf.publish("5.txt").await.unwrap();
    leaf.publish("5.txt").await.unwrap();
    yield_many().await;

    let entries = sp.index_snapshot("5.txt").unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.contains(&peer(2)));
}
