//! Sync progress registry.
//!
//! [`SyncProgressRegistry`] tracks background sync jobs across many
//! connections at once. Subscribing looks up the connection's active
//! job (retrying while the server is still scheduling it), opens a
//! progress stream, and pumps the stream's events through the pure
//! subscription state machine in seam-core. Finished entries linger for
//! a grace period so late progress readers still see the final
//! counters.
//!
//! Entries are epoch-stamped. Every subscribe takes a fresh epoch, and
//! removals only fire when the epoch still matches, so a stale grace
//! timer or an abandoned lookup can never tear down a newer
//! subscription for the same connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use seam_core::{ReconnectPolicy, SubscriptionAction, SubscriptionEvent, SyncSubscription};
use seam_types::{active_job, ConnectionId, ProgressUpdate, SyncJob};

use crate::api::ConnectApi;
use crate::config::RegistryConfig;
use crate::stream::{ProgressStream, ProgressTransport, StreamHandle};

/// Notifications delivered on the registry's notice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// A non-terminal progress frame arrived.
    Progress {
        /// Connection whose job progressed.
        connection_id: ConnectionId,
        /// The cumulative counters.
        update: ProgressUpdate,
    },
    /// The job reached a terminal frame.
    Finished {
        /// Connection whose job finished.
        connection_id: ConnectionId,
        /// The final counters, including failure detail.
        update: ProgressUpdate,
    },
    /// The stream failed for good; no further updates will arrive.
    StreamFailed {
        /// Connection whose stream failed.
        connection_id: ConnectionId,
        /// Failure description.
        message: String,
    },
    /// A reconnect attempt is starting.
    Reconnecting {
        /// Connection whose stream dropped.
        connection_id: ConnectionId,
        /// 1-based attempt number.
        attempt: u32,
    },
}

struct Entry {
    phase: EntryPhase,
    epoch: u64,
}

impl Entry {
    fn shut_down(self) {
        if let EntryPhase::Live(live) = self.phase {
            live.stream.cancel();
            live.pump.abort();
        }
    }
}

enum EntryPhase {
    /// Job lookup in flight; holds the slot so subscribe stays
    /// idempotent.
    PendingLookup,
    Live(LiveEntry),
}

struct LiveEntry {
    subscription: SyncSubscription,
    stream: StreamHandle,
    pump: JoinHandle<()>,
}

struct RegistryShared<A, T> {
    api: Arc<A>,
    stream: ProgressStream<T>,
    config: RegistryConfig,
    entries: DashMap<ConnectionId, Entry>,
    notices: mpsc::UnboundedSender<SyncNotice>,
    epoch: AtomicU64,
}

/// Tracks sync job progress for any number of connections.
///
/// Notices are delivered on the channel returned by
/// [`SyncProgressRegistry::new`]; current counters are always
/// inspectable with [`SyncProgressRegistry::get_progress`].
pub struct SyncProgressRegistry<A, T> {
    shared: Arc<RegistryShared<A, T>>,
}

impl<A, T> SyncProgressRegistry<A, T>
where
    A: ConnectApi + 'static,
    T: ProgressTransport + 'static,
{
    /// Create a registry over the given API and stream transport.
    /// Returns the registry and its notice channel.
    pub fn new(
        api: Arc<A>,
        transport: Arc<T>,
        reconnect: ReconnectPolicy,
        config: RegistryConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SyncNotice>) {
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(RegistryShared {
            api,
            stream: ProgressStream::new(transport, reconnect),
            config,
            entries: DashMap::new(),
            notices,
            epoch: AtomicU64::new(0),
        });
        (Self { shared }, notice_rx)
    }

    /// Start tracking sync progress for `connection_id`.
    ///
    /// Looks up the connection's active job, retrying briefly while the
    /// server is still scheduling it, then opens the progress stream.
    /// When no active job turns up the subscription is withdrawn
    /// without a notice. Subscribing to an already-tracked connection
    /// is a no-op.
    pub async fn subscribe(&self, connection_id: ConnectionId) {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        match self.shared.entries.entry(connection_id) {
            MapEntry::Occupied(_) => {
                debug!(%connection_id, "sync subscription already present");
                return;
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    phase: EntryPhase::PendingLookup,
                    epoch,
                });
            }
        }
        match self.shared.lookup_active_job(&connection_id).await {
            Some(job) => RegistryShared::activate(&self.shared, connection_id, epoch, &job),
            // Nothing to track; withdraw the slot unless something newer
            // claimed it while we were looking
            None => self.shared.remove_entry(&connection_id, Some(epoch)),
        }
    }

    /// Stop tracking `connection_id` and drop its entry immediately.
    pub fn unsubscribe(&self, connection_id: &ConnectionId) {
        self.shared.remove_entry(connection_id, None);
    }

    /// The latest counters for `connection_id`, seeded from the job
    /// listing and overwritten by each stream frame.
    pub fn get_progress(&self, connection_id: &ConnectionId) -> Option<ProgressUpdate> {
        self.shared
            .entries
            .get(connection_id)
            .and_then(|entry| match &entry.phase {
                EntryPhase::Live(live) => live.subscription.last_update.clone(),
                EntryPhase::PendingLookup => None,
            })
    }

    /// Whether `connection_id` has a live subscription still expecting
    /// updates.
    pub fn has_active_subscription(&self, connection_id: &ConnectionId) -> bool {
        self.shared
            .entries
            .get(connection_id)
            .map(|entry| match &entry.phase {
                EntryPhase::Live(live) => live.subscription.is_active(),
                EntryPhase::PendingLookup => false,
            })
            .unwrap_or(false)
    }

    /// Whether `connection_id`'s stream is between reconnect attempts.
    pub fn is_reconnecting(&self, connection_id: &ConnectionId) -> bool {
        self.shared
            .entries
            .get(connection_id)
            .map(|entry| match &entry.phase {
                EntryPhase::Live(live) => live.subscription.is_reconnecting(),
                EntryPhase::PendingLookup => false,
            })
            .unwrap_or(false)
    }

    /// Connections currently tracked, in no particular order.
    pub fn subscribed_ids(&self) -> Vec<ConnectionId> {
        self.shared.entries.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of tracked connections.
    pub fn len(&self) -> usize {
        self.shared.entries.len()
    }

    /// Whether no connection is tracked.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
    }

    /// Drop every subscription. For host teardown.
    pub fn cleanup(&self) {
        let ids = self.subscribed_ids();
        let count = ids.len();
        for id in &ids {
            self.shared.remove_entry(id, None);
        }
        if count > 0 {
            debug!(count, "sync subscriptions cleared");
        }
    }
}

impl<A, T> RegistryShared<A, T>
where
    A: ConnectApi + 'static,
    T: ProgressTransport + 'static,
{
    /// Find the connection's active job, retrying on the lookup
    /// schedule. Lookup errors count as "not found yet".
    async fn lookup_active_job(&self, connection_id: &ConnectionId) -> Option<SyncJob> {
        let policy = self.config.lookup_policy();
        let mut delays = policy.delays.iter();
        loop {
            match self.api.list_jobs(connection_id).await {
                Ok(jobs) => {
                    if let Some(job) = active_job(&jobs) {
                        return Some(job.clone());
                    }
                }
                Err(e) => {
                    warn!(%connection_id, "job lookup failed: {}", e);
                }
            }
            match delays.next() {
                Some(delay) => tokio::time::sleep(*delay).await,
                None => {
                    debug!(
                        %connection_id,
                        "no active sync job found after {} attempts",
                        policy.total_attempts()
                    );
                    return None;
                }
            }
        }
    }

    /// Turn a pending slot into a live subscription: open the stream,
    /// seed the counters from the job listing, start the event pump.
    fn activate(shared: &Arc<Self>, connection_id: ConnectionId, epoch: u64, job: &SyncJob) {
        let mut entry = match shared.entries.get_mut(&connection_id) {
            Some(entry) => entry,
            // Unsubscribed while the lookup ran
            None => return,
        };
        if entry.epoch != epoch || !matches!(entry.phase, EntryPhase::PendingLookup) {
            return;
        }
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let stream = shared.stream.subscribe(connection_id, events_tx);
        let subscription = SyncSubscription::new(
            connection_id,
            job.id,
            Some(job.last_progress()),
            current_millis(),
        );
        let pump = tokio::spawn(Self::pump(
            Arc::clone(shared),
            connection_id,
            epoch,
            events_rx,
        ));
        entry.phase = EntryPhase::Live(LiveEntry {
            subscription,
            stream,
            pump,
        });
    }

    /// Feed stream events through the subscription state machine and
    /// execute the actions it returns. The map guard is released before
    /// actions run.
    async fn pump(
        shared: Arc<Self>,
        connection_id: ConnectionId,
        epoch: u64,
        mut events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let actions = {
                let mut entry = match shared.entries.get_mut(&connection_id) {
                    Some(entry) => entry,
                    None => return,
                };
                if entry.epoch != epoch {
                    return;
                }
                let live = match &mut entry.phase {
                    EntryPhase::Live(live) => live,
                    EntryPhase::PendingLookup => return,
                };
                let (next, actions) =
                    live.subscription.clone().on_event(event, current_millis());
                live.subscription = next;
                actions
            };
            for action in actions {
                // RemoveNow aborts this very task; it is the last action
                // of its transition and the abort only lands at the next
                // recv, so the loop drains the whole batch first.
                Self::run_action(&shared, &connection_id, epoch, action);
            }
        }
    }

    fn run_action(
        shared: &Arc<Self>,
        connection_id: &ConnectionId,
        epoch: u64,
        action: SubscriptionAction,
    ) {
        match action {
            SubscriptionAction::NotifyProgress { update } => {
                let _ = shared.notices.send(SyncNotice::Progress {
                    connection_id: *connection_id,
                    update,
                });
            }
            SubscriptionAction::NotifyFinished { update } => {
                let _ = shared.notices.send(SyncNotice::Finished {
                    connection_id: *connection_id,
                    update,
                });
            }
            SubscriptionAction::NotifyError { message } => {
                let _ = shared.notices.send(SyncNotice::StreamFailed {
                    connection_id: *connection_id,
                    message,
                });
            }
            SubscriptionAction::NotifyReconnecting { attempt } => {
                let _ = shared.notices.send(SyncNotice::Reconnecting {
                    connection_id: *connection_id,
                    attempt,
                });
            }
            SubscriptionAction::ScheduleRemoval => {
                let shared = Arc::clone(shared);
                let connection_id = *connection_id;
                let grace = shared.config.grace_delay();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    shared.remove_entry(&connection_id, Some(epoch));
                });
            }
            SubscriptionAction::RemoveNow => {
                shared.remove_entry(connection_id, Some(epoch));
            }
        }
    }

    /// Remove the entry and stop its workers. With an epoch, removal is
    /// conditional on the entry still being the one that scheduled it.
    fn remove_entry(&self, connection_id: &ConnectionId, epoch: Option<u64>) {
        let removed = self
            .entries
            .remove_if(connection_id, |_, entry| {
                epoch.map_or(true, |e| entry.epoch == e)
            });
        if let Some((_, entry)) = removed {
            entry.shut_down();
            debug!(%connection_id, "sync subscription removed");
        }
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
