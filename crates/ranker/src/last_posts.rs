//! Last-post collection
//!
//! Records, for every participant, the timestamp of their newest text note.
//! Used to find isolated participants who are still active.

use crate::batch::run_in_batches;
use crate::coordinator::Job;
use crate::graph::Roster;
use async_trait::async_trait;
use followrank_common::config::RankingConfig;
use followrank_common::db::{LastPostRecord, RankStore};
use followrank_common::errors::Result;
use followrank_common::metrics;
use followrank_common::nostr::{Filter, PublicKey, RelayGateway};
use followrank_common::TEXT_NOTE_KIND;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastPostSummary {
    pub roster_size: usize,
    pub recorded: usize,
    pub batches: usize,
}

pub struct LastPostCollector {
    store: Arc<dyn RankStore>,
    relay: Arc<dyn RelayGateway>,
    batch_size: usize,
    timeout: Duration,
}

impl LastPostCollector {
    pub fn new(store: Arc<dyn RankStore>, relay: Arc<dyn RelayGateway>, config: &RankingConfig) -> Self {
        Self {
            store,
            relay,
            batch_size: config.fetch_batch_size,
            timeout: config.fetch_timeout(),
        }
    }

    #[instrument(skip(self))]
    pub async fn collect(&self) -> Result<LastPostSummary> {
        let stored = self.store.participant_keys().await?;
        let (roster, _) = Roster::from_npubs(&stored);

        let run = run_in_batches(roster.entries(), self.batch_size, |entry| {
            self.latest_post(entry.key, entry.npub.clone())
        })
        .await;
        let records: Vec<LastPostRecord> = run.outputs.into_iter().flatten().collect();

        let recorded = self.store.record_last_posts(&records).await?;
        metrics::record_last_posts(recorded);
        info!(roster_size = roster.len(), recorded, "Last posts collected");

        Ok(LastPostSummary {
            roster_size: roster.len(),
            recorded,
            batches: run.batch_sizes.len(),
        })
    }

    /// Newest text note of one participant; failures count as "no post"
    async fn latest_post(&self, key: PublicKey, npub: String) -> Option<LastPostRecord> {
        let filter = Filter::new().kind(TEXT_NOTE_KIND).author(&key).limit(1);

        let events = match tokio::time::timeout(self.timeout, self.relay.fetch_latest(filter, 1)).await {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                debug!(%key, error = %e, "Last post lookup failed");
                return None;
            }
            Err(_) => {
                debug!(%key, "Last post lookup timed out");
                return None;
            }
        };

        let author = key.to_hex();
        events
            .into_iter()
            .filter(|e| e.kind == TEXT_NOTE_KIND && e.pubkey == author)
            .map(|e| e.created_at)
            .max()
            .map(|created_at| LastPostRecord {
                pubkey: npub,
                last_post_date: created_at as i64,
            })
    }
}

#[async_trait]
impl Job for LastPostCollector {
    type Output = LastPostSummary;

    fn name(&self) -> &'static str {
        "last_posts"
    }

    async fn run(&self) -> Result<LastPostSummary> {
        self.collect().await
    }
}
