use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::PendingJob;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Durable store of image edit jobs.
///
/// Every method is a single atomic update or query; there are no multi-step
/// transactions.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// All jobs currently pending, joined with their batch's settings template.
    async fn list_pending(&self) -> Result<Vec<PendingJob>, StoreError>;

    /// Set status to processing if, and only if, the job is still pending.
    /// Returns whether the job was acquired.
    async fn claim(&self, job_id: Uuid) -> Result<bool, StoreError>;

    /// Mark done and record the published result URL, if the job is
    /// processing. Returns whether the write happened.
    async fn mark_done(&self, job_id: Uuid, edited_url: &str) -> Result<bool, StoreError>;

    /// Mark failed if the job is processing. Returns whether the write happened.
    async fn mark_failed(&self, job_id: Uuid) -> Result<bool, StoreError>;

    /// Move processing jobs created before `cutoff` back to pending.
    /// Returns how many were moved.
    async fn reset_stuck(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown job status in store: {0}")]
    UnknownStatus(String),

    #[error("Job store unavailable: {0}")]
    Unavailable(String),
}

pub mod queries;
