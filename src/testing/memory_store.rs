use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{JobStore, StoreError};
use crate::models::job::{Batch, ImageJob, JobStatus, PendingJob};

/// A status write the job state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub job_id: Uuid,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// In-memory implementation of [`JobStore`].
///
/// Terminal writes are conditional on the job being processing, like the SQL
/// adapter. A refused write is also recorded for assertions.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<Vec<ImageJob>>>,
    batches: Arc<RwLock<HashMap<Uuid, Batch>>>,
    illegal: Arc<RwLock<Vec<IllegalTransition>>>,
    unavailable: Arc<RwLock<bool>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_batch(&self, edit_settings: serde_json::Value) -> Uuid {
        let batch = Batch {
            id: Uuid::new_v4(),
            edit_settings,
            created_at: Utc::now(),
        };
        let id = batch.id;
        self.batches.write().await.insert(id, batch);
        id
    }

    /// Insert a pending job created now.
    pub async fn insert_job(
        &self,
        batch_id: Uuid,
        original_url: &str,
        image_override_settings: Option<serde_json::Value>,
    ) -> Uuid {
        let id = self
            .insert_job_at(batch_id, original_url, Utc::now(), JobStatus::Pending)
            .await;
        if let Some(job) = self.jobs.write().await.iter_mut().find(|j| j.id == id) {
            job.image_override_settings = image_override_settings;
        }
        id
    }

    /// Insert a job with an explicit creation time and status.
    pub async fn insert_job_at(
        &self,
        batch_id: Uuid,
        original_url: &str,
        created_at: DateTime<Utc>,
        status: JobStatus,
    ) -> Uuid {
        let job = ImageJob {
            id: Uuid::new_v4(),
            batch_id,
            status,
            original_url: original_url.to_string(),
            edited_url: None,
            image_override_settings: None,
            created_at,
            claimed_at: None,
        };
        let id = job.id;
        self.jobs.write().await.push(job);
        id
    }

    pub async fn job(&self, job_id: Uuid) -> Option<ImageJob> {
        self.jobs.read().await.iter().find(|j| j.id == job_id).cloned()
    }

    pub async fn jobs(&self) -> Vec<ImageJob> {
        self.jobs.read().await.clone()
    }

    pub async fn illegal_transitions(&self) -> Vec<IllegalTransition> {
        self.illegal.read().await.clone()
    }

    /// Put a job back to pending the way an external resubmission would,
    /// bypassing the state machine.
    pub async fn resubmit(&self, job_id: Uuid) {
        if let Some(job) = self.jobs.write().await.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Pending;
        }
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        if *self.unavailable.read().await {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    /// Apply a terminal transition. Edges outside the state machine are
    /// recorded and refused, as the conditional SQL update refuses them.
    async fn set_status(&self, job_id: Uuid, to: JobStatus, edited_url: Option<&str>) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) else {
            return false;
        };
        let from = job.status;
        if !from.can_transition_to(to) {
            self.illegal
                .write()
                .await
                .push(IllegalTransition { job_id, from, to });
            return false;
        }
        job.status = to;
        if let Some(url) = edited_url {
            job.edited_url = Some(url.to_string());
        }
        true
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn list_pending(&self) -> Result<Vec<PendingJob>, StoreError> {
        self.check_available().await?;
        let batches = self.batches.read().await;
        let mut pending: Vec<PendingJob> = self
            .jobs
            .read()
            .await
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| PendingJob {
                id: j.id,
                batch_id: j.batch_id,
                original_url: j.original_url.clone(),
                image_override_settings: j.image_override_settings.clone(),
                batch_settings: batches.get(&j.batch_id).map(|b| b.edit_settings.clone()),
                created_at: j.created_at,
            })
            .collect();
        pending.sort_by_key(|j| j.created_at);
        Ok(pending)
    }

    async fn claim(&self, job_id: Uuid) -> Result<bool, StoreError> {
        self.check_available().await?;
        let mut jobs = self.jobs.write().await;
        match jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Processing;
                job.claimed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_done(&self, job_id: Uuid, edited_url: &str) -> Result<bool, StoreError> {
        self.check_available().await?;
        Ok(self
            .set_status(job_id, JobStatus::Done, Some(edited_url))
            .await)
    }

    async fn mark_failed(&self, job_id: Uuid) -> Result<bool, StoreError> {
        self.check_available().await?;
        Ok(self.set_status(job_id, JobStatus::Failed, None).await)
    }

    async fn reset_stuck(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available().await?;
        let mut jobs = self.jobs.write().await;
        let mut reset = 0;
        for job in jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Processing && j.created_at < cutoff)
        {
            job.status = JobStatus::Pending;
            reset += 1;
        }
        Ok(reset)
    }
}
