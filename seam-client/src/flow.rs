//! Connect flow driver.
//!
//! [`ConnectFlowController`] owns one popup-mediated authorization flow.
//! The decisions live in the pure state machine in seam-core; this
//! driver executes its actions against the real world: the server API,
//! the window system, the popup watchdog, and the completion message
//! listener.
//!
//! The delicate part is the race between the user closing the popup and
//! the completion message arriving on the same turn. Completion is
//! recorded in an atomic flag synchronously on receipt, before any
//! await, and the watchdog consults that flag (again, under the state
//! lock) before it cancels. A completion that arrived first in logical
//! time therefore always wins, whatever the task scheduling order.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use seam_core::{FlowAction, FlowEvent, FlowState};
use seam_types::{ConnectRequest, ConnectionId};

use crate::api::ConnectApi;
use crate::channel::AuthMessageChannel;
use crate::config::FlowConfig;
use crate::window::WindowSystem;

pub use seam_core::FlowSignal;

/// Ephemeral record of one authorization attempt.
///
/// Exists from initiation until the flow settles. The recorded
/// connection id is what cancellation deletes, and what a completion
/// message that omits its id falls back to.
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    /// The creation request driving this attempt.
    pub request: ConnectRequest,
    /// Server-issued connection id, once creation succeeded.
    pub connection_id: Option<ConnectionId>,
}

impl ConnectionAttempt {
    fn new(request: ConnectRequest) -> Self {
        Self {
            request,
            connection_id: None,
        }
    }

    /// Integration being connected.
    pub fn integration(&self) -> &str {
        &self.request.integration
    }
}

struct FlowInner {
    state: FlowState,
    attempt: Option<ConnectionAttempt>,
    popup: Option<crate::window::PopupHandle>,
    watchdog: Option<JoinHandle<()>>,
    listener: Option<AuthMessageChannel>,
}

struct FlowShared<A, W> {
    api: Arc<A>,
    window: Arc<W>,
    config: FlowConfig,
    inner: Mutex<FlowInner>,
    completed: AtomicBool,
    signals: mpsc::UnboundedSender<FlowSignal>,
}

/// Drives popup-mediated connection authorization.
///
/// One controller runs one flow at a time; initiating while a flow is in
/// flight is ignored. Outcomes are delivered on the signal channel
/// returned by [`ConnectFlowController::new`], and the current state is
/// always inspectable with [`ConnectFlowController::state`].
pub struct ConnectFlowController<A, W> {
    shared: Arc<FlowShared<A, W>>,
}

impl<A, W> ConnectFlowController<A, W>
where
    A: ConnectApi + 'static,
    W: WindowSystem + 'static,
{
    /// Create a controller over the given API and window system.
    /// Returns the controller and its signal channel.
    pub fn new(
        api: Arc<A>,
        window: Arc<W>,
        config: FlowConfig,
    ) -> (Self, mpsc::UnboundedReceiver<FlowSignal>) {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(FlowShared {
            api,
            window,
            config,
            inner: Mutex::new(FlowInner {
                state: FlowState::new(),
                attempt: None,
                popup: None,
                watchdog: None,
                listener: None,
            }),
            completed: AtomicBool::new(false),
            signals,
        });
        (Self { shared }, signal_rx)
    }

    /// Start the authorization flow for a new connection.
    ///
    /// Ignored when a flow is already in flight. Every outcome,
    /// including failures, arrives as a [`FlowSignal`]; this method
    /// itself never fails.
    pub async fn initiate_oauth(&self, request: ConnectRequest) {
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.state.in_flight() {
                debug!(
                    integration = %request.integration,
                    "connect flow already in flight, ignoring"
                );
                return;
            }
            inner.attempt = Some(ConnectionAttempt::new(request));
        }
        self.shared.completed.store(false, Ordering::SeqCst);
        FlowShared::ensure_listener(&self.shared).await;
        FlowShared::dispatch(&self.shared, FlowEvent::Initiated).await;
    }

    /// Re-open the popup after it was blocked, reusing the stored
    /// authorization URL.
    pub async fn retry_popup(&self) {
        FlowShared::dispatch(&self.shared, FlowEvent::RetryRequested).await;
    }

    /// Record that the user opened the authorization URL manually (for
    /// example in a new tab) instead of retrying the popup.
    pub async fn manual_link_clicked(&self) {
        FlowShared::dispatch(&self.shared, FlowEvent::ManualLinkOpened).await;
    }

    /// Cancel the flow: close the popup and delete the half-created
    /// connection. A no-op when no flow is in flight.
    pub async fn cancel(&self) {
        FlowShared::dispatch(&self.shared, FlowEvent::Cancelled).await;
    }

    /// The current flow state.
    pub async fn state(&self) -> FlowState {
        self.shared.inner.lock().await.state.clone()
    }

    /// The attempt currently in flight, if any.
    pub async fn attempt(&self) -> Option<ConnectionAttempt> {
        self.shared.inner.lock().await.attempt.clone()
    }

    /// Tear the flow down without emitting any signal: stop the
    /// watchdog and listener, close the popup, and forget the attempt.
    /// For host teardown, where nobody is listening anymore.
    pub async fn shutdown(&self) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(watchdog) = inner.watchdog.take() {
            watchdog.abort();
        }
        inner.listener = None;
        if let Some(handle) = inner.popup.take() {
            if self.shared.window.is_open(handle) {
                self.shared.window.close(handle);
            }
        }
        inner.attempt = None;
        inner.state = FlowState::Idle;
    }
}

impl<A, W> FlowShared<A, W>
where
    A: ConnectApi + 'static,
    W: WindowSystem + 'static,
{
    /// Feed an event through the state machine and execute the actions
    /// it returns, queueing any follow-up events they produce.
    async fn dispatch(shared: &Arc<Self>, event: FlowEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let actions = {
                let mut inner = shared.inner.lock().await;
                let (next, actions) = inner.state.clone().on_event(event);
                inner.state = next;
                actions
            };
            for action in actions {
                if let Some(follow_up) = Self::run_action(shared, action).await {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    async fn run_action(shared: &Arc<Self>, action: FlowAction) -> Option<FlowEvent> {
        match action {
            FlowAction::CreateConnection => {
                let request = {
                    let inner = shared.inner.lock().await;
                    inner.attempt.as_ref().map(|a| a.request.clone())
                }?;
                match shared.api.create_connection(&request).await {
                    Ok(response) => {
                        let auth_url = response.auth_url().map(str::to_string);
                        let mut inner = shared.inner.lock().await;
                        if let Some(attempt) = inner.attempt.as_mut() {
                            attempt.connection_id = Some(response.id);
                        }
                        Some(FlowEvent::ConnectionCreated { auth_url })
                    }
                    Err(e) => {
                        warn!("connection creation failed: {}", e);
                        Some(FlowEvent::CreateFailed {
                            message: e.to_string(),
                        })
                    }
                }
            }

            FlowAction::OpenPopup { auth_url } => {
                match shared.window.open(&auth_url, shared.config.popup_spec()) {
                    Ok(handle) => {
                        shared.inner.lock().await.popup = Some(handle);
                        Some(FlowEvent::PopupOpened)
                    }
                    Err(e) => {
                        debug!("authorization popup not opened: {}", e);
                        Some(FlowEvent::PopupDenied { auth_url })
                    }
                }
            }

            FlowAction::StartWatchdog => {
                Self::start_watchdog(shared).await;
                None
            }

            FlowAction::StopWatchdog => {
                if let Some(watchdog) = shared.inner.lock().await.watchdog.take() {
                    watchdog.abort();
                }
                None
            }

            FlowAction::ClosePopup => {
                let handle = shared.inner.lock().await.popup.take();
                if let Some(handle) = handle {
                    if shared.window.is_open(handle) {
                        shared.window.close(handle);
                    }
                }
                None
            }

            FlowAction::DeleteConnection => {
                let id = {
                    let mut inner = shared.inner.lock().await;
                    inner.attempt.take().and_then(|a| a.connection_id)
                };
                if let Some(id) = id {
                    // Best effort; the flow is over either way
                    if let Err(e) = shared.api.delete_connection(&id).await {
                        warn!(%id, "failed to delete abandoned connection: {}", e);
                    }
                }
                None
            }

            FlowAction::Emit(signal) => {
                let signal = match signal {
                    FlowSignal::Completed { connection_id } => {
                        let mut inner = shared.inner.lock().await;
                        let fallback = inner.attempt.take().and_then(|a| a.connection_id);
                        FlowSignal::Completed {
                            connection_id: connection_id.or(fallback),
                        }
                    }
                    other => other,
                };
                // Every signal ends the flow, so the listener goes with
                // it. When the listener itself is running this dispatch,
                // the abort lands after its final await; nothing is cut
                // short. Emit must stay the last action of a transition.
                drop(shared.inner.lock().await.listener.take());
                let _ = shared.signals.send(signal);
                None
            }
        }
    }

    /// Start (or replace) the message listener for this flow.
    async fn ensure_listener(shared: &Arc<Self>) {
        let mut inner = shared.inner.lock().await;
        let listening = inner
            .listener
            .as_ref()
            .map(|l| !l.is_closed())
            .unwrap_or(false);
        if listening {
            return;
        }
        let listener_shared = Arc::clone(shared);
        inner.listener = Some(AuthMessageChannel::open(
            shared.window.as_ref(),
            move |result| {
                // Recorded synchronously on receipt, before any await: a
                // watchdog tick on this same turn must see the
                // completion and stand down.
                listener_shared.completed.store(true, Ordering::SeqCst);
                async move {
                    Self::dispatch(&listener_shared, FlowEvent::Completed { result }).await;
                }
            },
        ));
    }

    // Boxed rather than `async fn`: the spawned task awaits
    // `watchdog_cancel`, whose actions can re-enter `start_watchdog`,
    // and the compiler cannot resolve `Send` for that opaque cycle.
    fn start_watchdog(shared: &Arc<Self>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut inner = shared.inner.lock().await;
            if let Some(old) = inner.watchdog.take() {
                old.abort();
            }
            let shared = Arc::clone(shared);
            let interval = shared.config.watchdog_interval();
            inner.watchdog = Some(tokio::spawn(async move {
                let mut ticks = tokio::time::interval(interval);
                // The immediate first tick is not a check
                ticks.tick().await;
                loop {
                    ticks.tick().await;
                    if shared.completed.load(Ordering::SeqCst) {
                        return;
                    }
                    let abandoned = {
                        let inner = shared.inner.lock().await;
                        match inner.popup {
                            Some(handle) => !shared.window.is_open(handle),
                            // Manual-link flows have no handle to watch
                            None => false,
                        }
                    };
                    if abandoned {
                        debug!("authorization popup closed by the user");
                        Self::watchdog_cancel(&shared).await;
                        return;
                    }
                }
            }));
        })
    }

    /// Cancel on behalf of the watchdog, unless a completion was
    /// recorded first.
    async fn watchdog_cancel(shared: &Arc<Self>) {
        let actions = {
            let mut inner = shared.inner.lock().await;
            // Re-checked under the state lock: a completion recorded
            // while this task was waiting for the lock still wins.
            if shared.completed.load(Ordering::SeqCst) {
                return;
            }
            // This task returns right after, so it drops its own
            // registration here; the StopWatchdog action below then
            // finds nothing to abort and the action chain runs intact.
            inner.watchdog = None;
            let (next, actions) = inner.state.clone().on_event(FlowEvent::Cancelled);
            inner.state = next;
            actions
        };
        for action in actions {
            // Cancellation produces no follow-up events
            let _ = Self::run_action(shared, action).await;
        }
    }
}
