//! NIP-01 events and subscription filters

use super::key::PublicKey;
use serde::{Deserialize, Serialize};

/// A signed Nostr event as delivered by a relay.
///
/// Signatures are not verified here; the ranking only reads authorship,
/// kind, timestamp and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sig: String,
}

impl Event {
    /// Raw key of the author
    pub fn author(&self) -> Option<PublicKey> {
        PublicKey::from_hex(&self.pubkey).ok()
    }

    /// Values of every tag whose discriminator equals `name`
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }

    /// Keys referenced by `p` tags, skipping values that are not valid keys
    pub fn referenced_pubkeys(&self) -> Vec<PublicKey> {
        self.tag_values("p")
            .filter_map(|value| PublicKey::from_hex(value).ok())
            .collect()
    }
}

/// Subscription filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn author(mut self, key: &PublicKey) -> Self {
        self.authors.push(key.to_hex());
        self
    }

    pub fn since(mut self, timestamp: u64) -> Self {
        self.since = Some(timestamp);
        self
    }

    pub fn until(mut self, timestamp: u64) -> Self {
        self.until = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an event satisfies this filter
    pub fn matches(&self, event: &Event) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && (self.authors.is_empty() || self.authors.iter().any(|a| a == &event.pubkey))
            && self.since.map_or(true, |since| event.created_at >= since)
            && self.until.map_or(true, |until| event.created_at <= until)
    }
}
