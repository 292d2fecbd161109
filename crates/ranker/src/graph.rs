//! Roster and follow graph
//!
//! The roster is an arena of participants addressed by position. The graph
//! stores, for each position, the sorted set of roster positions it follows.
//! Keys outside the roster never enter the graph.

use crate::batch::run_in_batches;
use crate::resolver::{FollowListResolver, Resolution};
use followrank_common::nostr::{decode_npub, PublicKey};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// One ranked participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub key: PublicKey,
    /// Encoded form as stored
    pub npub: String,
}

/// Participants of one run, in store order, without duplicates
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
    index: HashMap<PublicKey, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from stored npub strings.
    ///
    /// Returns the roster and the number of entries that were skipped
    /// because they did not decode.
    pub fn from_npubs(stored: &[String]) -> (Self, usize) {
        let mut roster = Self::new();
        let mut skipped = 0;

        for npub in stored {
            match decode_npub(npub) {
                Ok(key) => {
                    roster.push(key, npub.trim().to_string());
                }
                Err(e) => {
                    warn!(npub = %npub, error = %e, "Skipping undecodable participant");
                    skipped += 1;
                }
            }
        }

        (roster, skipped)
    }

    /// Add a participant; duplicates keep their first position.
    pub fn push(&mut self, key: PublicKey, npub: String) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(RosterEntry { key, npub });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, key: &PublicKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, position: usize) -> Option<&RosterEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn keys(&self) -> Vec<PublicKey> {
        self.entries.iter().map(|e| e.key).collect()
    }
}

/// Directed follow graph over roster positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowGraph {
    adjacency: Vec<Vec<usize>>,
}

impl FollowGraph {
    /// Graph with `nodes` participants and no edges
    pub fn empty(nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); nodes],
        }
    }

    /// Graph from raw adjacency lists.
    ///
    /// Targets outside `0..adjacency.len()` are dropped and each list is
    /// sorted and deduplicated.
    pub fn from_adjacency(mut adjacency: Vec<Vec<usize>>) -> Self {
        let nodes = adjacency.len();
        for targets in &mut adjacency {
            targets.retain(|&t| t < nodes);
            targets.sort_unstable();
            targets.dedup();
        }
        Self { adjacency }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Positions followed by `node`, ascending
    pub fn follows(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.follows(node).len()
    }

    /// Reverse adjacency: for each node, the nodes that follow it
    pub fn incoming(&self) -> Vec<Vec<usize>> {
        let mut incoming = vec![Vec::new(); self.adjacency.len()];
        for (source, targets) in self.adjacency.iter().enumerate() {
            for &target in targets {
                incoming[target].push(source);
            }
        }
        incoming
    }
}

/// What happened while building one graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Size of each resolution batch, in execution order
    pub batch_sizes: Vec<usize>,
    pub found: usize,
    pub missing: usize,
    pub failed: usize,
    pub edges: usize,
}

/// Resolves every roster member's follow list in bounded batches
pub struct GraphBuilder {
    resolver: FollowListResolver,
    batch_size: usize,
}

impl GraphBuilder {
    pub fn new(resolver: FollowListResolver, batch_size: usize) -> Self {
        Self {
            resolver,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn build(&self, roster: &Roster) -> (FollowGraph, BuildReport) {
        let keys = roster.keys();
        let run = run_in_batches(&keys, self.batch_size, |&key| self.resolver.resolve(key)).await;

        let mut report = BuildReport {
            batch_sizes: run.batch_sizes,
            ..Default::default()
        };

        let adjacency: Vec<Vec<usize>> = run
            .outputs
            .into_iter()
            .map(|resolution| {
                match &resolution {
                    Resolution::Found(_) => report.found += 1,
                    Resolution::Missing => report.missing += 1,
                    Resolution::Failed(_) => report.failed += 1,
                }
                resolution
                    .into_follows()
                    .iter()
                    .filter_map(|target| roster.position(target))
                    .collect()
            })
            .collect();

        let graph = FollowGraph::from_adjacency(adjacency);
        report.edges = graph.edge_count();

        info!(
            nodes = graph.node_count(),
            edges = report.edges,
            found = report.found,
            missing = report.missing,
            failed = report.failed,
            batches = report.batch_sizes.len(),
            "Follow graph built"
        );

        (graph, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{contact_list, key, npub, ScriptedRelay};
    use std::sync::Arc;
    use std::time::Duration;

    fn roster_of(ids: impl IntoIterator<Item = u8>) -> Roster {
        let mut roster = Roster::new();
        for id in ids {
            roster.push(key(id), npub(id));
        }
        roster
    }

    fn builder(relay: ScriptedRelay, batch_size: usize) -> GraphBuilder {
        let resolver = FollowListResolver::new(Arc::new(relay), Duration::from_millis(200));
        GraphBuilder::new(resolver, batch_size)
    }

    #[test]
    fn test_roster_collapses_duplicates_and_skips_garbage() {
        let stored = vec![
            npub(1),
            "nsec1notapublickey".to_string(),
            npub(2),
            npub(1),
            "npub1garbage".to_string(),
        ];

        let (roster, skipped) = Roster::from_npubs(&stored);
        assert_eq!(roster.len(), 2);
        assert_eq!(skipped, 2);
        assert_eq!(roster.position(&key(1)), Some(0));
        assert_eq!(roster.position(&key(2)), Some(1));
        assert_eq!(roster.get(1).unwrap().npub, npub(2));
    }

    #[test]
    fn test_from_adjacency_normalizes() {
        let graph = FollowGraph::from_adjacency(vec![vec![2, 1, 2, 7], vec![], vec![0]]);
        assert_eq!(graph.follows(0), &[1, 2]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.incoming()[2], vec![0]);
        assert_eq!(graph.follows(99), &[] as &[usize]);
    }

    #[tokio::test]
    async fn test_non_roster_targets_are_dropped() {
        let relay = ScriptedRelay::new(vec![
            contact_list(&key(1), 10, &[key(2), key(50), key(2), key(1)]),
            contact_list(&key(2), 10, &[key(60)]),
        ]);
        let roster = roster_of([1, 2]);

        let (graph, report) = builder(relay, 10).build(&roster).await;
        // Self-follow is kept as an ordinary edge
        assert_eq!(graph.follows(0), &[0, 1]);
        assert!(graph.follows(1).is_empty());
        assert_eq!(report.edges, 2);
        assert_eq!(report.found, 2);
    }

    #[tokio::test]
    async fn test_batches_of_twenty_five() {
        let ids: Vec<u8> = (1..=25).collect();
        let events = ids
            .iter()
            .map(|&id| contact_list(&key(id), 1, &[key(id % 25 + 1)]))
            .collect();
        let roster = roster_of(ids.iter().copied());

        let (graph, report) = builder(ScriptedRelay::new(events), 10).build(&roster).await;
        assert_eq!(report.batch_sizes, vec![10, 10, 5]);
        assert_eq!(graph.edge_count(), 25);
    }

    #[tokio::test]
    async fn test_adjacency_is_invariant_to_batch_size() {
        let ids: Vec<u8> = (1..=25).collect();
        let events: Vec<_> = ids
            .iter()
            .map(|&id| contact_list(&key(id), 1, &[key(id % 7 + 1), key(id % 5 + 3), key(200)]))
            .collect();
        let roster = roster_of(ids.iter().copied());

        let (reference, _) = builder(ScriptedRelay::new(events.clone()), 10).build(&roster).await;
        for batch_size in [1, 3, 25, 100] {
            let (graph, _) = builder(ScriptedRelay::new(events.clone()), batch_size).build(&roster).await;
            assert_eq!(graph, reference, "batch size {}", batch_size);
        }
    }

    #[tokio::test]
    async fn test_missing_and_failed_lists_yield_no_edges() {
        let relay = ScriptedRelay::new(vec![
            contact_list(&key(1), 10, &[key(2), key(3)]),
            contact_list(&key(3), 10, &[key(1)]),
        ])
        .failing_for(&key(3));
        let roster = roster_of([1, 2, 3]);

        let (graph, report) = builder(relay, 10).build(&roster).await;
        assert_eq!(graph.follows(0), &[1, 2]);
        assert!(graph.follows(1).is_empty());
        assert!(graph.follows(2).is_empty());
        assert_eq!((report.found, report.missing, report.failed), (1, 1, 1));
    }
}
