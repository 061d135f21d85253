use std::collections::{HashMap, HashSet};

use petgraph::graph::UnGraph;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::{Mutex, Notify};

use crate::types::{PeerId, Topology};

/// Builds the super-peer overlay adjacency (spec §4.1 step 3).
///
/// `petgraph::UnGraph` is used purely to *construct* the topology — the
/// result is immediately flattened into plain `neighbor: Vec<PeerId>` lists
/// per super id. No graph object is retained at runtime; each `SuperPeer`
/// only ever holds its own neighbor set (spec §9's cyclic-reference design
/// note).
pub fn build_adjacency(n_supers: u32, topology: Topology) -> HashMap<PeerId, Vec<PeerId>> {
    let mut graph = UnGraph::<u32, ()>::new_undirected();
    let nodes: Vec<_> = (1..=n_supers).map(|id| graph.add_node(id)).collect();

    match topology {
        Topology::AllToAll => {
            for i in 0..nodes.len() {
                for j in (i + 1)..nodes.len() {
                    graph.add_edge(nodes[i], nodes[j], ());
                }
            }
        }
        Topology::Linear => {
            for i in 0..nodes.len().saturating_sub(1) {
                graph.add_edge(nodes[i], nodes[i + 1], ());
            }
        }
    }

    let mut adjacency = HashMap::new();
    for (idx, &node) in nodes.iter().enumerate() {
        let id = PeerId((idx + 1) as u32);
        let neighbors = graph
            .neighbors(node)
            .map(|n| PeerId(graph[n]))
            .collect();
        adjacency.insert(id, neighbors);
    }
    adjacency
}

/// Per-leaf file assignment: which files it starts with, and which files it
/// will request once the experiment starts.
pub struct LeafFilePlan {
    pub initial_files: Vec<String>,
    pub request_files: Vec<String>,
}

/// Implements spec §4.1 step 4: choose a universe of file names, assign each
/// leaf `filesPerLeaf` distinct initial files, then assign each leaf up to
/// `requestsPerLeaf` distinct request files drawn from the globally "used"
/// set, excluding files that leaf already holds.
pub fn generate_file_plan(
    n_leaves: u32,
    files_per_leaf: u32,
    requests_per_leaf: u32,
    duplication_factor: u32,
    rng: &mut impl Rng,
) -> Vec<LeafFilePlan> {
    let universe_size = ((n_leaves * files_per_leaf) / duplication_factor.max(1)).max(1);
    let mut universe: Vec<u32> = (1..=universe_size).collect();

    let mut initial_files: Vec<HashSet<u32>> = Vec::with_capacity(n_leaves as usize);
    let mut used: HashSet<u32> = HashSet::new();

    for _ in 0..n_leaves {
        universe.shuffle(rng);
        let take = (files_per_leaf as usize).min(universe.len());
        let files: HashSet<u32> = universe[..take].iter().copied().collect();
        used.extend(files.iter().copied());
        initial_files.push(files);
    }

    let used_vec: Vec<u32> = used.into_iter().collect();

    let mut plans = Vec::with_capacity(n_leaves as usize);
    for files in initial_files {
        let available: Vec<u32> = used_vec
            .iter()
            .copied()
            .filter(|n| !files.contains(n))
            .collect();
        let num_requests = (requests_per_leaf as usize).min(available.len());

        let mut shuffled = available.clone();
        shuffled.shuffle(rng);
        let requests: Vec<u32> = shuffled.into_iter().take(num_requests).collect();

        plans.push(LeafFilePlan {
            initial_files: files.into_iter().map(|n| format!("{n}.txt")).collect(),
            request_files: requests.into_iter().map(|n| format!("{n}.txt")).collect(),
        });
    }
    plans
}

/// `readyCount`/`completeCount` barrier: a counter plus a condition for
/// "count has reached target", translated from spec §3's
/// `mutex + condition_variable` to async primitives.
pub struct Barrier {
    count: Mutex<u32>,
    target: u32,
    notify: Notify,
}

impl Barrier {
    pub fn new(target: u32) -> Self {
        Self {
            count: Mutex::new(0),
            target,
            notify: Notify::new(),
        }
    }

    /// Increments the counter; wakes any waiter once the target is reached.
    pub async fn increment(&self) {
        let mut count = self.count.lock().await;
        *count += 1;
        if *count >= self.target {
            self.notify.notify_waiters();
        }
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if *self.count.lock().await >= self.target {
                return;
            }
            notified.await;
        }
    }
}
