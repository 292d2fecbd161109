//! Persistence seam for background jobs
//!
//! Jobs depend on this trait rather than on [`Repository`](super::Repository)
//! so that they can run against any store that offers these operations.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One participant's score and position in the ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRecord {
    /// npub-encoded public key
    pub pubkey: String,
    pub score: f64,
    /// 1-based, 1 is the highest score
    pub rank: i32,
}

/// Newest text-note timestamp of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPostRecord {
    /// npub-encoded public key
    pub pubkey: String,
    /// Unix seconds
    pub last_post_date: i64,
}

#[async_trait]
pub trait RankStore: Send + Sync {
    /// Every known participant identifier, in store order
    async fn participant_keys(&self) -> Result<Vec<String>>;

    /// Replace the whole rank table with `records`.
    ///
    /// Either every record is visible afterwards or the previous table is
    /// left untouched. Rows are written `batch_size` at a time.
    async fn replace_ranks(&self, records: &[RankRecord], batch_size: usize) -> Result<usize>;

    /// Insert or update last-post timestamps
    async fn record_last_posts(&self, posts: &[LastPostRecord]) -> Result<usize>;

    /// Add a discovered participant; returns false if it was already known
    async fn insert_participant_if_absent(&self, pubkey: &str, registered_on: NaiveDate) -> Result<bool>;
}
