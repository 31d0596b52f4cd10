use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::db::{JobStore, StoreError};
use crate::models::job::PendingJob;
use crate::models::settings::{EditSettings, SettingsError};
use crate::services::lifecycle::{recovery_cutoff, ClaimOutcome, JobLifecycle};
use crate::services::pipeline;
use crate::services::transport::{DecodeError, ImageTransport, PublishError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Why a single job failed. Never escapes the job it belongs to.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done { edited_url: String },
    Failed,
    /// Someone else had already claimed the job.
    Skipped,
}

/// Counts for one pass over the pending jobs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub found: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Single sequential control loop over pending jobs.
pub struct Poller {
    store: Arc<dyn JobStore>,
    lifecycle: JobLifecycle,
    transport: ImageTransport,
    interval: Duration,
    strict_settings: bool,
}

impl Poller {
    pub fn new(store: Arc<dyn JobStore>, transport: ImageTransport, interval: Duration) -> Self {
        Self {
            lifecycle: JobLifecycle::new(store.clone()),
            store,
            transport,
            interval,
            strict_settings: false,
        }
    }

    /// Reject resolved settings outside the editor's ranges instead of
    /// passing them through.
    pub fn with_strict_settings(mut self, strict: bool) -> Self {
        self.strict_settings = strict;
        self
    }

    /// Startup recovery: revert jobs stuck in processing for longer than `window`.
    pub async fn recover_stuck(&self, window: Duration) -> Result<u64, StoreError> {
        self.lifecycle
            .recover(recovery_cutoff(Utc::now(), window))
            .await
    }

    /// Poll until `cancel` fires. Only a store failure ends the loop early.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), StoreError> {
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Poller started");

        while !cancel.is_cancelled() {
            let summary = self.tick(&cancel).await?;
            if summary.found > 0 {
                tracing::info!(
                    found = summary.found,
                    completed = summary.completed,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Tick finished"
                );
            } else {
                tracing::trace!("No pending jobs, sleeping");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        tracing::info!("Poller stopped");
        Ok(())
    }

    /// One pass: process every currently pending job in store order.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, StoreError> {
        let jobs = self.store.list_pending().await?;
        metrics::gauge!("edit_jobs_pending").set(jobs.len() as f64);

        let mut summary = TickSummary {
            found: jobs.len(),
            ..TickSummary::default()
        };
        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "Found pending job(s)");
        }

        for job in &jobs {
            if cancel.is_cancelled() {
                tracing::info!("Shutdown requested, leaving remaining jobs pending");
                break;
            }

            match self.process_one(job).await? {
                JobOutcome::Done { .. } => summary.completed += 1,
                JobOutcome::Failed => summary.failed += 1,
                JobOutcome::Skipped => summary.skipped += 1,
            }
        }

        Ok(summary)
    }

    /// Claim, edit and publish one job, recording done or failed.
    ///
    /// Settings, download and publish errors mark the job failed and are
    /// swallowed here; only store errors propagate.
    pub async fn process_one(&self, job: &PendingJob) -> Result<JobOutcome, StoreError> {
        tracing::info!(job_id = %job.id, batch_id = %job.batch_id, "Processing job");

        if self.lifecycle.claim(job.id).await? == ClaimOutcome::AlreadyClaimed {
            return Ok(JobOutcome::Skipped);
        }

        let start = Instant::now();
        let outcome = match self.edit(job).await {
            Ok(edited_url) => {
                self.lifecycle.complete(job.id, &edited_url).await?;
                JobOutcome::Done { edited_url }
            }
            Err(e) => {
                self.lifecycle.fail(job.id, &e).await?;
                JobOutcome::Failed
            }
        };
        metrics::histogram!("edit_job_processing_seconds").record(start.elapsed().as_secs_f64());

        Ok(outcome)
    }

    async fn edit(&self, job: &PendingJob) -> Result<String, JobError> {
        let settings = EditSettings::resolve_json(
            job.batch_settings.as_ref(),
            job.image_override_settings.as_ref(),
            self.strict_settings,
        )?;
        tracing::debug!(job_id = %job.id, ?settings, "Resolved settings");

        let source = self.transport.fetch(&job.original_url).await?;
        let (width, height) = source.dimensions();
        tracing::debug!(job_id = %job.id, width, height, "Downloaded source image");

        let edited = pipeline::apply_settings(&source, &settings);

        Ok(self.transport.publish(job.id, &edited).await?)
    }
}
