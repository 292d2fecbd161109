//! Follow-list resolution
//!
//! Turns one participant key into the set of keys it follows, using the
//! newest contact-list event the relays know about.

use followrank_common::metrics;
use followrank_common::nostr::{Event, Filter, PublicKey, RelayGateway};
use followrank_common::CONTACT_LIST_KIND;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of resolving one participant's follow list
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Keys referenced by the newest contact list, in tag order
    Found(Vec<PublicKey>),
    /// The relays hold no contact list for this key
    Missing,
    /// The lookup errored or timed out
    Failed(String),
}

impl Resolution {
    /// Follow set as seen by the graph builder; misses count as empty
    pub fn into_follows(self) -> Vec<PublicKey> {
        match self {
            Resolution::Found(follows) => follows,
            Resolution::Missing | Resolution::Failed(_) => Vec::new(),
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Resolution::Found(_) => "found",
            Resolution::Missing => "missing",
            Resolution::Failed(_) => "failed",
        }
    }
}

/// Time-bounded contact-list lookups against a relay gateway
#[derive(Clone)]
pub struct FollowListResolver {
    relay: Arc<dyn RelayGateway>,
    timeout: Duration,
}

impl FollowListResolver {
    pub fn new(relay: Arc<dyn RelayGateway>, timeout: Duration) -> Self {
        Self { relay, timeout }
    }

    /// Resolve the follow list of `key`.
    ///
    /// Never fails: relay errors and timeouts come back as
    /// [`Resolution::Failed`] after being logged and counted.
    pub async fn resolve(&self, key: PublicKey) -> Resolution {
        let filter = Filter::new().kind(CONTACT_LIST_KIND).author(&key).limit(1);

        let resolution = match tokio::time::timeout(self.timeout, self.relay.fetch_latest(filter, 1)).await {
            Ok(Ok(events)) => match newest_contact_list(&key, events) {
                Some(event) => Resolution::Found(event.referenced_pubkeys()),
                None => Resolution::Missing,
            },
            Ok(Err(e)) => Resolution::Failed(e.to_string()),
            Err(_) => Resolution::Failed(format!(
                "no answer within {}ms",
                self.timeout.as_millis()
            )),
        };

        match &resolution {
            Resolution::Found(follows) => debug!(%key, follows = follows.len(), "Resolved follow list"),
            Resolution::Missing => debug!(%key, "No follow list"),
            Resolution::Failed(reason) => warn!(%key, reason = %reason, "Follow list lookup failed"),
        }
        metrics::record_resolution(resolution.outcome());

        resolution
    }
}

/// Newest contact list authored by `key`; relays may return extras
fn newest_contact_list(key: &PublicKey, events: Vec<Event>) -> Option<Event> {
    let author = key.to_hex();
    events
        .into_iter()
        .filter(|e| e.kind == CONTACT_LIST_KIND && e.pubkey == author)
        .max_by_key(|e| e.created_at)
}
