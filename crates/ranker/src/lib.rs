//! FollowRank ranking core
//!
//! Builds the follow graph of the known roster from relay contact lists,
//! scores it with PageRank and persists the ranking. Also hosts the two
//! collectors that keep the roster and its activity data fresh.
//!
//! Every long-running job is wrapped in a [`RunCoordinator`] so that at most
//! one run of each kind is active at a time.

pub mod assembler;
pub mod batch;
pub mod coordinator;
pub mod discovery;
pub mod graph;
pub mod last_posts;
pub mod pagerank;
pub mod pipeline;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Job, JobStatus, RunCoordinator, TriggerOutcome};
pub use discovery::{DiscoveryCollector, DiscoverySummary};
pub use graph::{BuildReport, FollowGraph, GraphBuilder, Roster};
pub use last_posts::{LastPostCollector, LastPostSummary};
pub use pagerank::{PageRank, PageRankConfig, PageRankOutcome};
pub use pipeline::{RankingPipeline, RankingSummary};
pub use resolver::{FollowListResolver, Resolution};

use followrank_common::config::AppConfig;
use followrank_common::db::RankStore;
use followrank_common::nostr::RelayGateway;
use std::sync::Arc;

/// The three background jobs, each behind its own coordinator
#[derive(Clone)]
pub struct Jobs {
    pub ranking: RunCoordinator<RankingPipeline>,
    pub last_posts: RunCoordinator<LastPostCollector>,
    pub discovery: RunCoordinator<DiscoveryCollector>,
}

impl Jobs {
    pub fn new(store: Arc<dyn RankStore>, relay: Arc<dyn RelayGateway>, config: &AppConfig) -> Self {
        Self {
            ranking: RunCoordinator::new(RankingPipeline::new(store.clone(), relay.clone(), &config.ranking)),
            last_posts: RunCoordinator::new(LastPostCollector::new(store.clone(), relay.clone(), &config.ranking)),
            discovery: RunCoordinator::new(DiscoveryCollector::new(store, relay, &config.discovery)),
        }
    }

    /// Run every job once, concurrently, and log failures
    pub async fn run_all(&self) {
        let (ranking, last_posts, discovery) = tokio::join!(
            self.ranking.run_now(),
            self.last_posts.run_now(),
            self.discovery.run_now()
        );

        for (job, failure) in [
            ("ranking", ranking.err()),
            ("last_posts", last_posts.err()),
            ("discovery", discovery.err()),
        ] {
            if let Some(e) = failure {
                tracing::warn!(job, error = %e, "Scheduled run did not complete");
            }
        }
    }
}
