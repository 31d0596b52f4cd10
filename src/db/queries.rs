use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use super::{JobStore, StoreError};
use crate::models::job::{ImageJob, JobStatus, PendingJob};

/// PostgreSQL-backed job store over the `images` and `batches` tables.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn list_pending(&self) -> Result<Vec<PendingJob>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT i.id, i.batch_id, i.original_url, i.image_override_settings, i.created_at,
                   b.edit_settings
            FROM images i
            LEFT JOIN batches b ON b.id = i.batch_id
            WHERE i.status = 'pending'
            ORDER BY i.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<PendingJob, StoreError> {
                Ok(PendingJob {
                    id: r.try_get("id")?,
                    batch_id: r.try_get("batch_id")?,
                    original_url: r.try_get("original_url")?,
                    image_override_settings: r.try_get("image_override_settings")?,
                    batch_settings: r.try_get("edit_settings")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn claim(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET status = 'processing',
                claimed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_done(&self, job_id: Uuid, edited_url: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET status = 'done',
                edited_url = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(edited_url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE images SET status = 'failed' WHERE id = $1 AND status = 'processing'")
                .bind(job_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset_stuck(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET status = 'pending'
            WHERE status = 'processing' AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<ImageJob>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT id, batch_id, status, original_url, edited_url, image_override_settings,
               created_at, claimed_at
        FROM images
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| image_job_from_row(&r)).transpose()
}

/// Insert a batch with its settings template.
pub async fn create_batch(
    pool: &PgPool,
    edit_settings: &serde_json::Value,
) -> Result<Uuid, StoreError> {
    let row = sqlx::query("INSERT INTO batches (edit_settings) VALUES ($1) RETURNING id")
        .bind(edit_settings)
        .fetch_one(pool)
        .await?;

    Ok(row.try_get("id")?)
}

/// Insert a pending image job.
pub async fn create_job(
    pool: &PgPool,
    batch_id: Uuid,
    original_url: &str,
    image_override_settings: Option<&serde_json::Value>,
) -> Result<ImageJob, StoreError> {
    let row = sqlx::query(
        r#"
        INSERT INTO images (batch_id, original_url, image_override_settings, status)
        VALUES ($1, $2, $3, 'pending')
        RETURNING id, batch_id, status, original_url, edited_url, image_override_settings,
                  created_at, claimed_at
        "#,
    )
    .bind(batch_id)
    .bind(original_url)
    .bind(image_override_settings)
    .fetch_one(pool)
    .await?;

    image_job_from_row(&row)
}

/// Number of jobs waiting to be picked up.
pub async fn count_pending(pool: &PgPool) -> Result<i64, StoreError> {
    let row = sqlx::query("SELECT COUNT(*) AS pending FROM images WHERE status = 'pending'")
        .fetch_one(pool)
        .await?;

    Ok(row.try_get("pending")?)
}

fn image_job_from_row(r: &PgRow) -> Result<ImageJob, StoreError> {
    let status_str: String = r.try_get("status")?;
    let status =
        JobStatus::from_str(&status_str).map_err(|_| StoreError::UnknownStatus(status_str))?;

    Ok(ImageJob {
        id: r.try_get("id")?,
        batch_id: r.try_get("batch_id")?,
        status,
        original_url: r.try_get("original_url")?,
        edited_url: r.try_get("edited_url")?,
        image_override_settings: r.try_get("image_override_settings")?,
        created_at: r.try_get("created_at")?,
        claimed_at: r.try_get("claimed_at")?,
    })
}
