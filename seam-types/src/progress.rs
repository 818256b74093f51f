//! Progress counters for a running sync job.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A snapshot of sync job progress.
///
/// Carried by progress frames on the event stream and seeded from job
/// listings. Counters are cumulative for the job, not deltas. Every field
/// is optional on the wire; absent fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgressUpdate {
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
    /// Entities skipped (filtered or unsupported).
    #[serde(default)]
    pub skipped: u64,
    /// Per-entity-type encounter counts, when the server reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities_encountered: Option<HashMap<String, u64>>,
    /// Set on the final frame of a successful job.
    #[serde(default)]
    pub is_complete: bool,
    /// Set on the final frame of a failed job.
    #[serde(default)]
    pub is_failed: bool,
    /// Failure detail, when the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressUpdate {
    /// Whether this update ends the job (completed or failed).
    pub fn is_terminal(&self) -> bool {
        self.is_complete || self.is_failed
    }

    /// Total entities processed across all counters.
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.deleted + self.kept + self.skipped
    }
}
