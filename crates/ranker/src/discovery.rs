//! Participant discovery
//!
//! Scans recent profile-metadata events and adds the authors of Japanese
//! profiles to the roster as newly discovered participants.

use crate::coordinator::Job;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use followrank_common::config::DiscoveryConfig;
use followrank_common::db::RankStore;
use followrank_common::errors::Result;
use followrank_common::language::profile_contains_japanese;
use followrank_common::metrics;
use followrank_common::nostr::{encode_npub, Filter, RelayGateway};
use followrank_common::METADATA_KIND;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoverySummary {
    /// Metadata events read from the relays
    pub scanned: usize,
    /// Events whose profile looked Japanese
    pub matched: usize,
    /// Participants that were not yet known
    pub inserted: usize,
}

pub struct DiscoveryCollector {
    store: Arc<dyn RankStore>,
    relay: Arc<dyn RelayGateway>,
    lookback: Duration,
}

impl DiscoveryCollector {
    pub fn new(store: Arc<dyn RankStore>, relay: Arc<dyn RelayGateway>, config: &DiscoveryConfig) -> Self {
        Self {
            store,
            relay,
            lookback: Duration::hours(config.lookback_hours),
        }
    }

    /// Scan the lookback window ending at `now`
    #[instrument(skip(self))]
    pub async fn discover(&self, now: DateTime<Utc>) -> Result<DiscoverySummary> {
        let since = (now - self.lookback).timestamp().max(0) as u64;
        let today = now.date_naive();

        let mut events = self
            .relay
            .fetch_stream(Filter::new().kind(METADATA_KIND).since(since))
            .await?;

        let mut summary = DiscoverySummary {
            scanned: 0,
            matched: 0,
            inserted: 0,
        };

        while let Some(event) = events.next().await {
            summary.scanned += 1;
            if !profile_contains_japanese(&event) {
                continue;
            }
            summary.matched += 1;

            let Some(author) = event.author() else {
                debug!(pubkey = %event.pubkey, "Skipping event with malformed author");
                continue;
            };
            let npub = match encode_npub(&author) {
                Ok(npub) => npub,
                Err(e) => {
                    warn!(%author, error = %e, "Failed to encode author");
                    continue;
                }
            };

            match self.store.insert_participant_if_absent(&npub, today).await {
                Ok(true) => {
                    debug!(npub = %npub, "Discovered participant");
                    summary.inserted += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(npub = %npub, error = %e, "Failed to store participant"),
            }
        }

        metrics::record_discovery(summary.inserted);
        info!(
            scanned = summary.scanned,
            matched = summary.matched,
            inserted = summary.inserted,
            "Discovery complete"
        );

        Ok(summary)
    }
}

#[async_trait]
impl Job for DiscoveryCollector {
    type Output = DiscoverySummary;

    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn run(&self) -> Result<DiscoverySummary> {
        self.discover(Utc::now()).await
    }
}
