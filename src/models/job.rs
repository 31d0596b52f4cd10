use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of an image edit job in the shared store.
///
/// Stored as its lowercase name in the `images.status` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Whether moving from `self` to `next` is an edge of the job state machine.
    ///
    /// `Processing -> Pending` is only taken by startup recovery.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Done)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// An image edit job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJob {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub status: JobStatus,
    pub original_url: String,
    pub edited_url: Option<String>,
    pub image_override_settings: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

/// A pending job joined with its batch's settings template, as listed by the poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingJob {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub original_url: String,
    pub image_override_settings: Option<serde_json::Value>,
    pub batch_settings: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A batch of jobs sharing one settings template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub edit_settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
