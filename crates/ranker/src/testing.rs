//! In-memory fakes for the relay and store seams

use async_trait::async_trait;
use chrono::NaiveDate;
use followrank_common::db::{LastPostRecord, RankRecord, RankStore};
use followrank_common::errors::{AppError, Result};
use followrank_common::nostr::{encode_npub, Event, EventStream, Filter, PublicKey, RelayGateway};
use followrank_common::{CONTACT_LIST_KIND, METADATA_KIND, TEXT_NOTE_KIND};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn key(n: u8) -> PublicKey {
    PublicKey::from_bytes([n; 32])
}

pub fn npub(n: u8) -> String {
    encode_npub(&key(n)).unwrap()
}

fn event(author: &PublicKey, kind: u16, created_at: u64, tags: Vec<Vec<String>>, content: &str) -> Event {
    Event {
        id: format!("{}-{}-{}", author.to_hex(), kind, created_at),
        pubkey: author.to_hex(),
        created_at,
        kind,
        tags,
        content: content.to_string(),
        sig: String::new(),
    }
}

pub fn contact_list(author: &PublicKey, created_at: u64, follows: &[PublicKey]) -> Event {
    let tags = follows
        .iter()
        .map(|k| vec!["p".to_string(), k.to_hex()])
        .collect();
    event(author, CONTACT_LIST_KIND, created_at, tags, "")
}

pub fn text_note(author: &PublicKey, created_at: u64) -> Event {
    event(author, TEXT_NOTE_KIND, created_at, Vec::new(), "gm")
}

pub fn metadata(author: &PublicKey, created_at: u64, content: &str) -> Event {
    event(author, METADATA_KIND, created_at, Vec::new(), content)
}

/// Relay that answers from a fixed event set
#[derive(Default)]
pub struct ScriptedRelay {
    events: Vec<Event>,
    failing: HashSet<String>,
    stalled: HashSet<String>,
    stream_fails: bool,
    calls: AtomicUsize,
}

impl ScriptedRelay {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, ..Default::default() }
    }

    /// Queries by this author return a relay error
    pub fn failing_for(mut self, author: &PublicKey) -> Self {
        self.failing.insert(author.to_hex());
        self
    }

    /// Queries by this author never answer
    pub fn stalled_for(mut self, author: &PublicKey) -> Self {
        self.stalled.insert(author.to_hex());
        self
    }

    pub fn failing_stream(mut self) -> Self {
        self.stream_fails = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn matching(&self, filter: &Filter) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events
    }
}

#[async_trait]
impl RelayGateway for ScriptedRelay {
    async fn fetch_latest(&self, filter: Filter, limit: usize) -> Result<Vec<Event>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if filter.authors.iter().any(|a| self.stalled.contains(a)) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if filter.authors.iter().any(|a| self.failing.contains(a)) {
            return Err(AppError::Relay {
                relay: "scripted".into(),
                message: "connection reset".into(),
            });
        }

        let mut events = self.matching(&filter);
        events.truncate(limit);
        Ok(events)
    }

    async fn fetch_stream(&self, filter: Filter) -> Result<EventStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stream_fails {
            return Err(AppError::RelayTimeout { timeout_ms: 1 });
        }
        Ok(Box::pin(futures::stream::iter(self.matching(&filter))))
    }
}

/// Store that keeps everything in memory
#[derive(Default)]
pub struct MemoryStore {
    participants: Mutex<Vec<(String, NaiveDate)>>,
    ranks: Mutex<Vec<RankRecord>>,
    last_posts: Mutex<HashMap<String, i64>>,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn with_participants<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let participants = keys.into_iter().map(|k| (k.into(), today)).collect();
        Self {
            participants: Mutex::new(participants),
            ..Default::default()
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn seed_ranks(&self, records: Vec<RankRecord>) {
        *self.ranks.lock().unwrap() = records;
    }

    pub fn ranks(&self) -> Vec<RankRecord> {
        self.ranks.lock().unwrap().clone()
    }

    pub fn last_posts(&self) -> HashMap<String, i64> {
        self.last_posts.lock().unwrap().clone()
    }

    pub fn participants(&self) -> Vec<(String, NaiveDate)> {
        self.participants.lock().unwrap().clone()
    }

    fn write_guard(&self) -> Result<()> {
        if self.fail_writes {
            return Err(AppError::DatabaseConnection {
                message: "store unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RankStore for MemoryStore {
    async fn participant_keys(&self) -> Result<Vec<String>> {
        if self.fail_reads {
            return Err(AppError::DatabaseConnection {
                message: "store unavailable".into(),
            });
        }
        Ok(self
            .participants
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn replace_ranks(&self, records: &[RankRecord], _batch_size: usize) -> Result<usize> {
        self.write_guard()?;
        *self.ranks.lock().unwrap() = records.to_vec();
        Ok(records.len())
    }

    async fn record_last_posts(&self, posts: &[LastPostRecord]) -> Result<usize> {
        self.write_guard()?;
        let mut stored = self.last_posts.lock().unwrap();
        for post in posts {
            stored.insert(post.pubkey.clone(), post.last_post_date);
        }
        Ok(posts.len())
    }

    async fn insert_participant_if_absent(&self, pubkey: &str, registered_on: NaiveDate) -> Result<bool> {
        self.write_guard()?;
        let mut participants = self.participants.lock().unwrap();
        if participants.iter().any(|(k, _)| k == pubkey) {
            return Ok(false);
        }
        participants.push((pubkey.to_string(), registered_on));
        Ok(true)
    }
}
