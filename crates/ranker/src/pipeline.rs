//! End-to-end ranking run
//!
//! Loads the roster, resolves the follow graph, computes PageRank and
//! replaces the stored ranks. A store failure at either end aborts the run
//! and leaves the previous ranks in place.

use crate::assembler::assemble;
use crate::coordinator::Job;
use crate::graph::{GraphBuilder, Roster};
use crate::pagerank::{PageRank, PageRankConfig};
use crate::resolver::FollowListResolver;
use async_trait::async_trait;
use followrank_common::config::RankingConfig;
use followrank_common::db::RankStore;
use followrank_common::errors::Result;
use followrank_common::metrics;
use followrank_common::nostr::RelayGateway;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Outcome of one ranking run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingSummary {
    pub roster_size: usize,
    /// Stored identifiers that did not decode
    pub skipped: usize,
    pub edges: usize,
    pub iterations: usize,
    pub converged: bool,
    pub persisted: usize,
    pub batches: usize,
    pub elapsed_ms: u64,
}

pub struct RankingPipeline {
    store: Arc<dyn RankStore>,
    builder: GraphBuilder,
    engine: PageRank,
    save_batch_size: usize,
}

impl RankingPipeline {
    pub fn new(store: Arc<dyn RankStore>, relay: Arc<dyn RelayGateway>, config: &RankingConfig) -> Self {
        let resolver = FollowListResolver::new(relay, config.fetch_timeout());
        Self {
            store,
            builder: GraphBuilder::new(resolver, config.fetch_batch_size),
            engine: PageRank::new(PageRankConfig::from(config)),
            save_batch_size: config.save_batch_size,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RankingSummary> {
        let start = Instant::now();

        let stored = self.store.participant_keys().await?;
        let (roster, skipped) = Roster::from_npubs(&stored);
        info!(roster_size = roster.len(), skipped, "Roster loaded");

        let (graph, report) = self.builder.build(&roster).await;
        let outcome = self.engine.compute(&graph);
        let records = assemble(&roster, &outcome.scores);

        let persisted = self.store.replace_ranks(&records, self.save_batch_size).await?;

        let summary = RankingSummary {
            roster_size: roster.len(),
            skipped,
            edges: report.edges,
            iterations: outcome.iterations,
            converged: outcome.converged,
            persisted,
            batches: report.batch_sizes.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        metrics::record_ranking(summary.roster_size, summary.edges, summary.iterations, summary.persisted);
        info!(
            roster_size = summary.roster_size,
            edges = summary.edges,
            iterations = summary.iterations,
            persisted = summary.persisted,
            elapsed_ms = summary.elapsed_ms,
            "Ranking complete"
        );

        Ok(summary)
    }
}

#[async_trait]
impl Job for RankingPipeline {
    type Output = RankingSummary;

    fn name(&self) -> &'static str {
        "ranking"
    }

    async fn run(&self) -> Result<RankingSummary> {
        RankingPipeline::run(self).await
    }
}
