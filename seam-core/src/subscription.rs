//! Sync progress subscription state machine.
//!
//! One `SyncSubscription` tracks the background sync job of a single
//! connection. The registry in seam-client feeds it stream events and
//! executes the returned actions (caller notification, entry removal).
//!
//! Status is monotonic: `Active → Completed` or `Active → Failed`. A
//! terminal subscription never transitions again; tracking the same
//! connection afterwards requires a fresh subscription.

use seam_types::{ConnectionId, JobId, ProgressUpdate};

/// Lifecycle status of a tracked subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Stream open (or reconnecting); updates still expected.
    Active,
    /// Job finished successfully.
    Completed,
    /// Job failed, or the stream errored out.
    Failed,
}

/// Progress tracking for one connection's background sync job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSubscription {
    /// Connection this subscription tracks.
    pub connection_id: ConnectionId,
    /// Job the stream is scoped to; reconciled by `connected` frames.
    pub job_id: JobId,
    /// Last received progress update, if any.
    pub last_update: Option<ProgressUpdate>,
    /// Unix epoch milliseconds of the last stream event.
    pub last_message_at: u64,
    /// Lifecycle status.
    pub status: SubscriptionStatus,
    /// 1-based reconnect attempt in progress, cleared once reconnected.
    pub reconnect_attempt: Option<u32>,
}

impl SyncSubscription {
    /// Create a fresh active subscription, seeded from the job's last
    /// known counters when available.
    pub fn new(
        connection_id: ConnectionId,
        job_id: JobId,
        seed: Option<ProgressUpdate>,
        now_ms: u64,
    ) -> Self {
        Self {
            connection_id,
            job_id,
            last_update: seed,
            last_message_at: now_ms,
            status: SubscriptionStatus::Active,
            reconnect_attempt: None,
        }
    }

    /// Process a stream event and return the new state plus actions to
    /// execute.
    ///
    /// This is a pure function - the caller supplies the current time and
    /// executes the returned actions. Terminal subscriptions ignore every
    /// event, which is what makes the finished/error notifications
    /// exactly-once.
    pub fn on_event(
        self,
        event: SubscriptionEvent,
        now_ms: u64,
    ) -> (Self, Vec<SubscriptionAction>) {
        if self.status != SubscriptionStatus::Active {
            return (self, vec![]);
        }

        match event {
            SubscriptionEvent::Connected { job_id } => (
                Self {
                    job_id,
                    reconnect_attempt: None,
                    last_message_at: now_ms,
                    ..self
                },
                vec![],
            ),
            SubscriptionEvent::Progress(update) => (
                Self {
                    last_update: Some(update.clone()),
                    last_message_at: now_ms,
                    ..self
                },
                vec![SubscriptionAction::NotifyProgress { update }],
            ),
            SubscriptionEvent::Complete(update) => {
                let status = if update.is_failed {
                    SubscriptionStatus::Failed
                } else {
                    SubscriptionStatus::Completed
                };
                (
                    Self {
                        last_update: Some(update.clone()),
                        last_message_at: now_ms,
                        status,
                        ..self
                    },
                    vec![
                        SubscriptionAction::NotifyFinished { update },
                        SubscriptionAction::ScheduleRemoval,
                    ],
                )
            }
            SubscriptionEvent::Error { message } => (
                Self {
                    status: SubscriptionStatus::Failed,
                    last_message_at: now_ms,
                    ..self
                },
                vec![
                    SubscriptionAction::NotifyError { message },
                    SubscriptionAction::RemoveNow,
                ],
            ),
            SubscriptionEvent::Reconnecting { attempt } => (
                Self {
                    reconnect_attempt: Some(attempt),
                    last_message_at: now_ms,
                    ..self
                },
                vec![SubscriptionAction::NotifyReconnecting { attempt }],
            ),
        }
    }

    /// Check if updates are still expected.
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Check if a reconnect attempt is in progress.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnect_attempt.is_some()
    }
}

/// Events fed to a subscription by its progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// Stream opened; carries the authoritative job id.
    Connected {
        /// Job id reported by the server. May differ from the tracked one
        /// when the initial lookup raced job creation.
        job_id: JobId,
    },
    /// Non-terminal progress frame.
    Progress(ProgressUpdate),
    /// Terminal progress frame (`is_complete` or `is_failed` set).
    Complete(ProgressUpdate),
    /// The stream failed fatally.
    Error {
        /// Error message describing the failure.
        message: String,
    },
    /// A reconnect attempt is about to start.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
}

/// Actions to be executed by the subscription registry.
///
/// These are instructions, not side effects. The registry interprets
/// them: notifications go to the caller's channel, removals mutate the
/// registry map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionAction {
    /// Deliver a progress update to the caller.
    NotifyProgress {
        /// The update to deliver.
        update: ProgressUpdate,
    },
    /// Deliver the terminal update to the caller.
    NotifyFinished {
        /// The terminal update.
        update: ProgressUpdate,
    },
    /// Deliver a fatal stream error to the caller.
    NotifyError {
        /// Error message describing the failure.
        message: String,
    },
    /// Tell the caller a reconnect attempt is starting.
    NotifyReconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Remove the registry entry after the grace delay.
    ScheduleRemoval,
    /// Remove the registry entry immediately.
    RemoveNow,
}
