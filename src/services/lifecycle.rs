//! Job status transitions and the side effects bound to each.
//!
//! ```text
//! pending --claim--> processing --complete--> done
//!                        |    \---fail------> failed
//!                        \--recover--> pending   (startup only)
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::{JobStore, StoreError};
use crate::models::job::JobStatus;

/// How long a job may sit in processing, measured from its creation, before
/// startup recovery returns it to pending.
pub const DEFAULT_RECOVERY_WINDOW: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The job moved pending -> processing and belongs to the caller.
    Acquired,
    /// The job was no longer pending; nothing was written.
    AlreadyClaimed,
}

pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Mark a job processing before any work starts on it.
    ///
    /// The write is conditional on the job still being pending, so a job that
    /// is already processing (or finished) is never claimed twice.
    pub async fn claim(&self, job_id: Uuid) -> Result<ClaimOutcome, StoreError> {
        if self.store.claim(job_id).await? {
            metrics::counter!("edit_jobs_claimed").increment(1);
            tracing::info!(job_id = %job_id, "Claimed job");
            Ok(ClaimOutcome::Acquired)
        } else {
            tracing::warn!(job_id = %job_id, "Job was no longer pending, skipping");
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    /// Record the published result and move processing -> done.
    ///
    /// Returns false, writing nothing, when the job was not processing.
    pub async fn complete(&self, job_id: Uuid, edited_url: &str) -> Result<bool, StoreError> {
        if !self.store.mark_done(job_id, edited_url).await? {
            refused(job_id, JobStatus::Done);
            return Ok(false);
        }
        metrics::counter!("edit_jobs_completed").increment(1);
        tracing::info!(job_id = %job_id, edited_url = %edited_url, "Job done");
        Ok(true)
    }

    /// Mark a job failed. The cause is only logged.
    ///
    /// Returns false, writing nothing, when the job was not processing.
    pub async fn fail(&self, job_id: Uuid, cause: &dyn fmt::Display) -> Result<bool, StoreError> {
        tracing::error!(job_id = %job_id, error = %cause, "Job failed");
        if !self.store.mark_failed(job_id).await? {
            refused(job_id, JobStatus::Failed);
            return Ok(false);
        }
        metrics::counter!("edit_jobs_failed").increment(1);
        Ok(true)
    }

    /// Return processing jobs created before `cutoff` to pending.
    ///
    /// Keys off creation time, not claim time: a job that waited long in the
    /// queue before being claimed can be reverted while still being worked on
    /// by a live process.
    pub async fn recover(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let reset = self.store.reset_stuck(cutoff).await?;
        if reset > 0 {
            metrics::counter!("edit_jobs_recovered").increment(reset);
            tracing::warn!(reset, cutoff = %cutoff, "Reset stuck job(s) to pending");
        } else {
            tracing::info!(cutoff = %cutoff, "No stuck jobs to recover");
        }
        Ok(reset)
    }
}

/// The only edge into a terminal status is from processing.
fn refused(job_id: Uuid, to: JobStatus) {
    tracing::warn!(
        job_id = %job_id,
        to = %to,
        "Refused status write: job is not processing"
    );
}

/// `now - window`, the creation-time cutoff for recovery.
pub fn recovery_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryJobStore;
    use serde_json::json;

    fn setup() -> (Arc<MemoryJobStore>, JobLifecycle) {
        let store = Arc::new(MemoryJobStore::new());
        let lifecycle = JobLifecycle::new(store.clone());
        (store, lifecycle)
    }

    #[tokio::test]
    async fn test_claim_then_complete() {
        let (store, lifecycle) = setup();
        let batch = store.insert_batch(json!({})).await;
        let job = store.insert_job(batch, "https://img/1.png", None).await;

        assert_eq!(lifecycle.claim(job).await.unwrap(), ClaimOutcome::Acquired);
        assert_eq!(store.job(job).await.unwrap().status, JobStatus::Processing);

        assert!(lifecycle.complete(job, "https://cdn/edited/1.jpg").await.unwrap());
        let done = store.job(job).await.unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.edited_url.as_deref(), Some("https://cdn/edited/1.jpg"));
        assert!(store.illegal_transitions().await.is_empty());
    }

    #[tokio::test]
    async fn test_fail_does_not_record_result() {
        let (store, lifecycle) = setup();
        let batch = store.insert_batch(json!({})).await;
        let job = store.insert_job(batch, "https://img/2.png", None).await;

        lifecycle.claim(job).await.unwrap();
        assert!(lifecycle.fail(job, &"decode blew up").await.unwrap());

        let failed = store.job(job).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.edited_url.is_none());
    }

    #[tokio::test]
    async fn test_terminal_writes_outside_processing_are_refused() {
        let (store, lifecycle) = setup();
        let batch = store.insert_batch(json!({})).await;
        let job = store.insert_job(batch, "https://img/4.png", None).await;

        // complete on a job nobody claimed
        assert!(!lifecycle.complete(job, "https://cdn/edited/4.jpg").await.unwrap());
        let pending = store.job(job).await.unwrap();
        assert_eq!(pending.status, JobStatus::Pending);
        assert!(pending.edited_url.is_none());

        lifecycle.claim(job).await.unwrap();
        assert!(lifecycle.complete(job, "https://cdn/edited/4.jpg").await.unwrap());

        // fail on a job that is already done
        assert!(!lifecycle.fail(job, &"late failure").await.unwrap());
        let done = store.job(job).await.unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.edited_url.as_deref(), Some("https://cdn/edited/4.jpg"));

        assert_eq!(store.illegal_transitions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reclaim_is_rejected_and_keeps_identity() {
        let (store, lifecycle) = setup();
        let batch = store.insert_batch(json!({"brightness": 1.1})).await;
        let job = store
            .insert_job(batch, "https://img/3.png", Some(json!({"hue": 10})))
            .await;

        lifecycle.claim(job).await.unwrap();
        let first = store.job(job).await.unwrap();

        assert_eq!(
            lifecycle.claim(job).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        let second = store.job(job).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.batch_id, first.batch_id);
        assert_eq!(second.original_url, first.original_url);
        assert_eq!(second.image_override_settings, first.image_override_settings);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.claimed_at, first.claimed_at);
        assert_eq!(second.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_recover_only_old_processing_jobs() {
        let (store, lifecycle) = setup();
        let batch = store.insert_batch(json!({})).await;
        let now = Utc::now();
        let old = now - chrono::Duration::minutes(30);
        let fresh = now - chrono::Duration::minutes(2);

        let stuck = store.insert_job_at(batch, "u", old, JobStatus::Processing).await;
        let recent = store.insert_job_at(batch, "u", fresh, JobStatus::Processing).await;
        let done = store.insert_job_at(batch, "u", old, JobStatus::Done).await;
        let failed = store.insert_job_at(batch, "u", old, JobStatus::Failed).await;
        let pending = store.insert_job_at(batch, "u", old, JobStatus::Pending).await;

        let cutoff = recovery_cutoff(now, DEFAULT_RECOVERY_WINDOW);
        assert_eq!(lifecycle.recover(cutoff).await.unwrap(), 1);

        assert_eq!(store.job(stuck).await.unwrap().status, JobStatus::Pending);
        assert_eq!(store.job(recent).await.unwrap().status, JobStatus::Processing);
        assert_eq!(store.job(done).await.unwrap().status, JobStatus::Done);
        assert_eq!(store.job(failed).await.unwrap().status, JobStatus::Failed);
        assert_eq!(store.job(pending).await.unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_recovery_cutoff() {
        let now = Utc::now();
        assert_eq!(
            recovery_cutoff(now, DEFAULT_RECOVERY_WINDOW),
            now - chrono::Duration::minutes(10)
        );
    }
}
