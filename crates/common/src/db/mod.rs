//! Database layer for FollowRank
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - The [`RankStore`] seam used by background jobs
//! - Connection pool management and schema bootstrap
//! - Seed roster import

pub mod models;
mod repository;
mod seed;
mod store;

pub use repository::{RecentIsolated, Repository};
pub use seed::{parse_seed_list, SeedImport};
pub use store::{LastPostRecord, RankRecord, RankStore};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use models::{LastPostEntity, ParticipantEntity, RankScoreColumn, RankScoreEntity};
use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = connect(&config.url, config, "primary").await?;

        // Connect to replica if configured
        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");
            Some(connect(read_url, config, "replica").await?)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }

    /// Create missing tables and indexes on the primary
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.write();
        create_table(conn, ParticipantEntity).await?;
        create_table(conn, RankScoreEntity).await?;
        create_table(conn, LastPostEntity).await?;

        let backend = conn.get_database_backend();
        let score_index = Index::create()
            .if_not_exists()
            .name("idx_pagerank_scores_score")
            .table(RankScoreEntity)
            .col(RankScoreColumn::Score)
            .to_owned();
        conn.execute(backend.build(&score_index)).await?;

        info!("Database schema ready");
        Ok(())
    }
}

async fn connect(url: &str, config: &DatabaseConfig, role: &str) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    Database::connect(opts)
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to {}: {}", role, e),
        })
}

async fn create_table<E: EntityTrait>(conn: &DatabaseConnection, entity: E) -> Result<()> {
    let backend = conn.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}
