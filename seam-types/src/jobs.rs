//! Background job listings for a source connection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{JobId, ProgressUpdate};

/// Lifecycle status of a background sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, not yet started.
    Pending,
    /// Currently running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Cancelled,
    /// A status this client version does not know.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether a job with this status is the one worth subscribing to.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// One entry from the job listing endpoint.
///
/// Carries the job's last known counters so a subscription can show
/// meaningful numbers before the first stream frame arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    /// Job identifier.
    pub id: JobId,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Entities inserted so far.
    #[serde(default)]
    pub inserted: u64,
    /// Entities updated so far.
    #[serde(default)]
    pub updated: u64,
    /// Entities deleted so far.
    #[serde(default)]
    pub deleted: u64,
    /// Entities unchanged and kept.
    #[serde(default)]
    pub kept: u64,
    /// Entities skipped.
    #[serde(default)]
    pub skipped: u64,
    /// Per-entity-type encounter counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities_encountered: Option<HashMap<String, u64>>,
    /// Failure detail for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncJob {
    /// The job's counters as a [`ProgressUpdate`], for seeding a fresh
    /// subscription.
    pub fn last_progress(&self) -> ProgressUpdate {
        ProgressUpdate {
            inserted: self.inserted,
            updated: self.updated,
            deleted: self.deleted,
            kept: self.kept,
            skipped: self.skipped,
            entities_encountered: self.entities_encountered.clone(),
            is_complete: self.status == JobStatus::Completed,
            is_failed: self.status == JobStatus::Failed,
            error: self.error.clone(),
        }
    }
}

/// Select the active job from a listing: the first whose status is
/// `pending` or `in_progress`.
pub fn active_job(jobs: &[SyncJob]) -> Option<&SyncJob> {
    jobs.iter().find(|job| job.status.is_active())
}
