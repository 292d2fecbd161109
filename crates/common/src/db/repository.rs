//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::store::{LastPostRecord, RankRecord, RankStore};
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Participant who posted recently, with their score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentIsolated {
    pub pubkey: String,
    pub last_post_date: i64,
    pub score: f64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Participant Operations
    // ========================================================================

    /// Participants registered on or after `since` that were discovered rather than imported
    pub async fn new_participants(&self, since: NaiveDate) -> Result<Vec<Participant>> {
        ParticipantEntity::find()
            .filter(ParticipantColumn::RegistrationDate.gte(since))
            .filter(ParticipantColumn::ExistingUser.eq(false))
            .order_by_asc(ParticipantColumn::RegistrationDate)
            .order_by_asc(ParticipantColumn::Pubkey)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Import a seed participant (existing user)
    pub async fn import_participant(&self, pubkey: &str, registered_on: NaiveDate) -> Result<bool> {
        self.insert_participant(pubkey, registered_on, true).await
    }

    async fn insert_participant(&self, pubkey: &str, registered_on: NaiveDate, existing: bool) -> Result<bool> {
        let participant = ParticipantActiveModel {
            pubkey: Set(pubkey.to_string()),
            registration_date: Set(registered_on),
            existing_user: Set(existing),
        };

        let inserted = ParticipantEntity::insert(participant)
            .on_conflict(
                OnConflict::column(ParticipantColumn::Pubkey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.write_conn())
            .await?;

        Ok(inserted > 0)
    }

    // ========================================================================
    // Rank Operations
    // ========================================================================

    /// Number of persisted rank records
    pub async fn count_ranks(&self) -> Result<u64> {
        RankScoreEntity::find()
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Highest-scored participants
    pub async fn top_ranks(&self, limit: u64) -> Result<Vec<RankScore>> {
        RankScoreEntity::find()
            .order_by_desc(RankScoreColumn::Score)
            .order_by_asc(RankScoreColumn::Rank)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Lowest-scored participants
    pub async fn bottom_ranks(&self, limit: u64) -> Result<Vec<RankScore>> {
        RankScoreEntity::find()
            .order_by_asc(RankScoreColumn::Score)
            .order_by_desc(RankScoreColumn::Rank)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Last Post Operations
    // ========================================================================

    /// Number of recorded last posts
    pub async fn count_last_posts(&self) -> Result<u64> {
        LastPostEntity::find()
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Every recorded last post, newest first
    pub async fn last_posts(&self) -> Result<Vec<LastPost>> {
        LastPostEntity::find()
            .order_by_desc(LastPostColumn::LastPostDate)
            .order_by_asc(LastPostColumn::Pubkey)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Lowest-scored participants among those who posted after `since`
    pub async fn recent_isolated(&self, since: i64, limit: u64) -> Result<Vec<RecentIsolated>> {
        // Filter posts first to keep the score lookup small
        let recent: HashMap<String, i64> = LastPostEntity::find()
            .filter(LastPostColumn::LastPostDate.gt(since))
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(|post| (post.pubkey, post.last_post_date))
            .collect();

        if recent.is_empty() {
            return Ok(Vec::new());
        }

        let scores = RankScoreEntity::find()
            .filter(RankScoreColumn::Pubkey.is_in(recent.keys().cloned()))
            .order_by_asc(RankScoreColumn::Score)
            .order_by_desc(RankScoreColumn::Rank)
            .limit(limit)
            .all(self.read_conn())
            .await?;

        Ok(scores
            .into_iter()
            .filter_map(|score| {
                recent.get(&score.pubkey).map(|&last_post_date| RecentIsolated {
                    pubkey: score.pubkey,
                    last_post_date,
                    score: score.score,
                })
            })
            .collect())
    }
}

#[async_trait]
impl RankStore for Repository {
    async fn participant_keys(&self) -> Result<Vec<String>> {
        ParticipantEntity::find()
            .select_only()
            .column(ParticipantColumn::Pubkey)
            .order_by_asc(ParticipantColumn::RegistrationDate)
            .order_by_asc(ParticipantColumn::Pubkey)
            .into_tuple::<String>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn replace_ranks(&self, records: &[RankRecord], batch_size: usize) -> Result<usize> {
        let txn = self.write_conn().begin().await?;

        let cleared = RankScoreEntity::delete_many().exec(&txn).await?;
        debug!(rows = cleared.rows_affected, "Cleared previous ranks");

        let total = records.len();
        let mut saved = 0;
        for batch in records.chunks(batch_size.max(1)) {
            let rows = batch.iter().map(|record| RankScoreActiveModel {
                pubkey: Set(record.pubkey.clone()),
                score: Set(record.score),
                rank: Set(record.rank),
            });
            RankScoreEntity::insert_many(rows)
                .exec_without_returning(&txn)
                .await?;

            saved += batch.len();
            debug!(saved, total, "Saved rank batch");
        }

        txn.commit().await?;
        info!(saved, "Rank table replaced");
        Ok(saved)
    }

    async fn record_last_posts(&self, posts: &[LastPostRecord]) -> Result<usize> {
        if posts.is_empty() {
            return Ok(0);
        }

        let rows = posts.iter().map(|post| LastPostActiveModel {
            pubkey: Set(post.pubkey.clone()),
            last_post_date: Set(post.last_post_date),
        });

        LastPostEntity::insert_many(rows)
            .on_conflict(
                OnConflict::column(LastPostColumn::Pubkey)
                    .update_column(LastPostColumn::LastPostDate)
                    .to_owned(),
            )
            .exec_without_returning(self.write_conn())
            .await?;

        Ok(posts.len())
    }

    async fn insert_participant_if_absent(&self, pubkey: &str, registered_on: NaiveDate) -> Result<bool> {
        self.insert_participant(pubkey, registered_on, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(pubkey: &str, score: f64, rank: i32) -> RankRecord {
        RankRecord { pubkey: pubkey.into(), score, rank }
    }

    #[tokio::test]
    async fn test_participants_round_trip() {
        let repo = Repository::new(memory_pool().await);
        tokio_test::assert_ok!(repo.ping().await);

        assert!(repo.import_participant("npub1old", date(2024, 1, 1)).await.unwrap());
        assert!(repo.insert_participant_if_absent("npub1new", date(2024, 3, 1)).await.unwrap());
        assert!(!repo.insert_participant_if_absent("npub1new", date(2024, 3, 2)).await.unwrap());

        let keys = repo.participant_keys().await.unwrap();
        assert_eq!(keys, vec!["npub1old".to_string(), "npub1new".to_string()]);

        let fresh = repo.new_participants(date(2024, 2, 1)).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].pubkey, "npub1new");
        assert!(!fresh[0].existing_user);
    }

    #[tokio::test]
    async fn test_replace_ranks_replaces_everything() {
        let repo = Repository::new(memory_pool().await);

        let first = vec![record("a", 0.5, 1), record("b", 0.3, 2), record("c", 0.2, 3)];
        assert_eq!(repo.replace_ranks(&first, 2).await.unwrap(), 3);
        assert_eq!(repo.count_ranks().await.unwrap(), 3);

        let second = vec![record("d", 0.9, 1)];
        repo.replace_ranks(&second, 100).await.unwrap();
        assert_eq!(repo.count_ranks().await.unwrap(), 1);
        assert_eq!(repo.top_ranks(10).await.unwrap()[0].pubkey, "d");
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_ranks() {
        let repo = Repository::new(memory_pool().await);
        repo.replace_ranks(&[record("a", 0.5, 1)], 100).await.unwrap();

        // Duplicate primary key aborts the transaction
        let broken = vec![record("x", 0.6, 1), record("x", 0.4, 2)];
        assert!(repo.replace_ranks(&broken, 100).await.is_err());

        let ranks = repo.top_ranks(10).await.unwrap();
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks[0].pubkey, "a");
    }

    #[tokio::test]
    async fn test_top_and_bottom_ranks() {
        let repo = Repository::new(memory_pool().await);
        let records = vec![record("a", 0.5, 1), record("b", 0.3, 2), record("c", 0.2, 3)];
        repo.replace_ranks(&records, 100).await.unwrap();

        let top: Vec<_> = repo.top_ranks(2).await.unwrap().into_iter().map(|r| r.pubkey).collect();
        assert_eq!(top, vec!["a", "b"]);

        let bottom: Vec<_> = repo.bottom_ranks(2).await.unwrap().into_iter().map(|r| r.pubkey).collect();
        assert_eq!(bottom, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_last_posts_upsert_and_recent_isolated() {
        let repo = Repository::new(memory_pool().await);

        let posts = vec![
            LastPostRecord { pubkey: "a".into(), last_post_date: 100 },
            LastPostRecord { pubkey: "b".into(), last_post_date: 500 },
            LastPostRecord { pubkey: "c".into(), last_post_date: 900 },
        ];
        assert_eq!(repo.record_last_posts(&posts).await.unwrap(), 3);
        repo.record_last_posts(&[LastPostRecord { pubkey: "a".into(), last_post_date: 1000 }])
            .await
            .unwrap();

        assert_eq!(repo.count_last_posts().await.unwrap(), 3);
        let newest = repo.last_posts().await.unwrap();
        assert_eq!(newest[0].pubkey, "a");
        assert_eq!(newest[0].last_post_date, 1000);

        let records = vec![record("a", 0.5, 1), record("b", 0.3, 2), record("c", 0.2, 3)];
        repo.replace_ranks(&records, 100).await.unwrap();

        let isolated = repo.recent_isolated(400, 10).await.unwrap();
        let keys: Vec<_> = isolated.iter().map(|r| r.pubkey.as_str()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
        assert_eq!(isolated[0].last_post_date, 900);

        assert!(repo.recent_isolated(5000, 10).await.unwrap().is_empty());
    }
}
