//! Streaming progress client.
//!
//! One worker per subscribed connection holds the server's progress
//! stream open, classifies frames, and survives transient failures with
//! bounded exponential backoff. The worker's output is the
//! [`SubscriptionEvent`] stream consumed by the registry's pure
//! subscription state machine.
//!
//! Reconnect policy: transient failures retry with delays from
//! [`ReconnectPolicy`], the attempt counter resets whenever a stream
//! opens successfully, and the first error past the budget is reported
//! as fatal. Client-class (4xx) rejections and terminal frames never
//! retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use seam_core::{ReconnectPolicy, SubscriptionEvent};
use seam_types::{ConnectionId, StreamFrame};

/// Errors that can occur on the progress stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The server refused the stream with a client-class (4xx) status.
    /// Retrying cannot fix these, so they are fatal immediately.
    #[error("stream rejected with {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as failure detail.
        message: String,
    },

    /// Opening the stream failed for a retryable reason.
    #[error("stream open failed: {0}")]
    OpenFailed(String),

    /// Reading from an open stream failed.
    #[error("stream read failed: {0}")]
    ReadFailed(String),
}

impl StreamError {
    /// Whether this failure skips the reconnect loop entirely.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// One open progress stream.
#[async_trait]
pub trait ProgressFeed: Send {
    /// The next classified frame, or `Ok(None)` when the server closed
    /// the stream cleanly.
    async fn next(&mut self) -> Result<Option<StreamFrame>, StreamError>;
}

/// Opens progress streams for connections.
#[async_trait]
pub trait ProgressTransport: Send + Sync {
    /// Open the progress event stream for the given connection.
    async fn open(&self, connection_id: &ConnectionId) -> Result<Box<dyn ProgressFeed>, StreamError>;
}

/// Drives progress streams, turning raw frames into subscription events.
#[derive(Debug, Clone)]
pub struct ProgressStream<T> {
    transport: Arc<T>,
    policy: ReconnectPolicy,
}

/// Control handle for one stream worker.
///
/// Dropping the handle does not stop the worker; call
/// [`StreamHandle::cancel`].
#[derive(Debug)]
pub struct StreamHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Stop the worker. No further events are delivered after this
    /// returns, including reconnect attempts already scheduled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    /// Whether the worker has stopped on its own (terminal frame or
    /// fatal error).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum FeedEnd {
    /// A terminal frame was delivered; the stream is done for good.
    Terminal,
    /// The worker was cancelled mid-read.
    Cancelled,
    /// The stream ended without a terminal frame; worth reconnecting.
    Retryable(String),
}

impl<T: ProgressTransport + 'static> ProgressStream<T> {
    /// Create a stream driver over the given transport.
    pub fn new(transport: Arc<T>, policy: ReconnectPolicy) -> Self {
        Self { transport, policy }
    }

    /// Open the stream for `connection_id` and drive it until a terminal
    /// frame, a fatal error, or cancellation. Events are pushed to
    /// `events`; the channel closes when the worker stops.
    pub fn subscribe(
        &self,
        connection_id: ConnectionId,
        events: mpsc::UnboundedSender<SubscriptionEvent>,
    ) -> StreamHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(Self::run(
            Arc::clone(&self.transport),
            connection_id,
            self.policy.clone(),
            events,
            Arc::clone(&cancelled),
        ));
        StreamHandle { cancelled, task }
    }

    async fn run(
        transport: Arc<T>,
        connection_id: ConnectionId,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<SubscriptionEvent>,
        cancelled: Arc<AtomicBool>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            let failure = match transport.open(&connection_id).await {
                Ok(feed) => {
                    // A successful open resets the backoff sequence
                    attempt = 0;
                    match Self::drive(feed, &events, &cancelled).await {
                        FeedEnd::Terminal | FeedEnd::Cancelled => return,
                        FeedEnd::Retryable(reason) => reason,
                    }
                }
                Err(e) if e.is_fatal() => {
                    warn!(%connection_id, "progress stream rejected: {}", e);
                    let _ = events.send(SubscriptionEvent::Error {
                        message: e.to_string(),
                    });
                    return;
                }
                Err(e) => e.to_string(),
            };

            attempt += 1;
            if !policy.allows(attempt) {
                warn!(%connection_id, "progress stream gave up: {}", failure);
                let _ = events.send(SubscriptionEvent::Error {
                    message: format!(
                        "gave up after {} reconnect attempts: {}",
                        policy.max_attempts, failure
                    ),
                });
                return;
            }
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            debug!(%connection_id, attempt, "reconnecting progress stream: {}", failure);
            let _ = events.send(SubscriptionEvent::Reconnecting { attempt });
            tokio::time::sleep(policy.delay(attempt)).await;
        }
    }

    async fn drive(
        mut feed: Box<dyn ProgressFeed>,
        events: &mpsc::UnboundedSender<SubscriptionEvent>,
        cancelled: &AtomicBool,
    ) -> FeedEnd {
        loop {
            if cancelled.load(Ordering::SeqCst) {
                return FeedEnd::Cancelled;
            }
            match feed.next().await {
                Ok(Some(StreamFrame::Connected { job_id })) => {
                    let _ = events.send(SubscriptionEvent::Connected { job_id });
                }
                Ok(Some(StreamFrame::Heartbeat)) => {}
                Ok(Some(StreamFrame::Error { message })) => {
                    let _ = events.send(SubscriptionEvent::Error { message });
                    return FeedEnd::Terminal;
                }
                Ok(Some(StreamFrame::Progress(update))) => {
                    if update.is_terminal() {
                        let _ = events.send(SubscriptionEvent::Complete(update));
                        return FeedEnd::Terminal;
                    }
                    let _ = events.send(SubscriptionEvent::Progress(update));
                }
                Ok(None) => {
                    return FeedEnd::Retryable("stream closed without a terminal frame".to_string())
                }
                Err(e) => return FeedEnd::Retryable(e.to_string()),
            }
        }
    }
}

mod http;
mod mock;

pub use http::HttpProgressTransport;
pub use mock::{FeedStep, MockProgressTransport};

#[cfg(test)]
mod tests {
    use super::*;
    use seam_types::{JobId, ProgressUpdate};
    use std::time::Duration;

    fn progress(inserted: u64) -> StreamFrame {
        StreamFrame::Progress(ProgressUpdate {
            inserted,
            ..Default::default()
        })
    }

    fn terminal() -> StreamFrame {
        StreamFrame::Progress(ProgressUpdate {
            is_complete: true,
            ..Default::default()
        })
    }

    async fn collect(
        mut rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
    ) -> Vec<SubscriptionEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    // ===========================================
    // Frame Routing Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn progress_frames_become_events_until_terminal() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_feed(vec![
                FeedStep::Frame(progress(10)),
                FeedStep::Frame(progress(25)),
                FeedStep::Frame(terminal()),
            ])
            .await;

        let stream = ProgressStream::new(Arc::clone(&transport), ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], SubscriptionEvent::Progress(u) if u.inserted == 10));
        assert!(matches!(&events[1], SubscriptionEvent::Progress(u) if u.inserted == 25));
        assert!(matches!(&events[2], SubscriptionEvent::Complete(u) if u.is_complete));
        assert_eq!(transport.open_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_are_dropped() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_feed(vec![
                FeedStep::Frame(StreamFrame::Heartbeat),
                FeedStep::Frame(progress(1)),
                FeedStep::Frame(StreamFrame::Heartbeat),
                FeedStep::Frame(terminal()),
            ])
            .await;

        let stream = ProgressStream::new(transport, ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn connected_frame_reports_authoritative_job_id() {
        let job_id = JobId::new();
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_feed(vec![
                FeedStep::Frame(StreamFrame::Connected { job_id }),
                FeedStep::Frame(terminal()),
            ])
            .await;

        let stream = ProgressStream::new(transport, ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        assert_eq!(events[0], SubscriptionEvent::Connected { job_id });
    }

    #[tokio::test(start_paused = true)]
    async fn error_frame_is_terminal_without_reconnect() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_feed(vec![FeedStep::Frame(StreamFrame::Error {
                message: "token expired".into(),
            })])
            .await;

        let stream = ProgressStream::new(Arc::clone(&transport), ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        assert_eq!(
            events,
            vec![SubscriptionEvent::Error {
                message: "token expired".into()
            }]
        );
        assert_eq!(transport.open_count().await, 1);
    }

    // ===========================================
    // Reconnect Policy Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_exponentially() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_open_failure(StreamError::OpenFailed("refused".into()))
            .await;
        transport
            .script_open_failure(StreamError::OpenFailed("refused".into()))
            .await;
        transport.script_feed(vec![FeedStep::Frame(terminal())]).await;

        let stream = ProgressStream::new(Arc::clone(&transport), ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let start = tokio::time::Instant::now();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        assert_eq!(
            events,
            vec![
                SubscriptionEvent::Reconnecting { attempt: 1 },
                SubscriptionEvent::Reconnecting { attempt: 2 },
                SubscriptionEvent::Complete(ProgressUpdate {
                    is_complete: true,
                    ..Default::default()
                }),
            ]
        );
        // 1s then 2s of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
        assert_eq!(transport.open_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_counter_resets_after_successful_open() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_open_failure(StreamError::OpenFailed("refused".into()))
            .await;
        transport
            .script_feed(vec![
                FeedStep::Frame(progress(5)),
                FeedStep::Fail("connection reset".into()),
            ])
            .await;
        transport.script_feed(vec![FeedStep::Frame(terminal())]).await;

        let stream = ProgressStream::new(transport, ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let start = tokio::time::Instant::now();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        // The read failure after a successful open restarts at attempt 1
        assert_eq!(
            events,
            vec![
                SubscriptionEvent::Reconnecting { attempt: 1 },
                SubscriptionEvent::Progress(ProgressUpdate {
                    inserted: 5,
                    ..Default::default()
                }),
                SubscriptionEvent::Reconnecting { attempt: 1 },
                SubscriptionEvent::Complete(ProgressUpdate {
                    is_complete: true,
                    ..Default::default()
                }),
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn clean_eof_without_terminal_frame_reconnects() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_feed(vec![FeedStep::Frame(progress(3)), FeedStep::Eof])
            .await;
        transport.script_feed(vec![FeedStep::Frame(terminal())]).await;

        let stream = ProgressStream::new(Arc::clone(&transport), ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        assert!(matches!(events[1], SubscriptionEvent::Reconnecting { attempt: 1 }));
        assert_eq!(transport.open_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_is_fatal() {
        let transport = Arc::new(MockProgressTransport::new());
        for _ in 0..6 {
            transport
                .script_open_failure(StreamError::OpenFailed("refused".into()))
                .await;
        }

        let stream = ProgressStream::new(Arc::clone(&transport), ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let start = tokio::time::Instant::now();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        let attempts: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                SubscriptionEvent::Reconnecting { attempt } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
        assert!(matches!(
            events.last(),
            Some(SubscriptionEvent::Error { message }) if message.contains("gave up after 5")
        ));
        // 1 + 2 + 4 + 8 + 16 seconds of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(31_000));
        assert_eq!(transport.open_count().await, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn client_rejection_skips_reconnect() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_open_failure(StreamError::Rejected {
                status: 404,
                message: "no such connection".into(),
            })
            .await;

        let stream = ProgressStream::new(Arc::clone(&transport), ReconnectPolicy::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let start = tokio::time::Instant::now();
        let _handle = stream.subscribe(ConnectionId::new(), tx);

        let events = collect(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            SubscriptionEvent::Error { message } if message.contains("404")
        ));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(transport.open_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_a_scheduled_reconnect() {
        let transport = Arc::new(MockProgressTransport::new());
        transport
            .script_open_failure(StreamError::OpenFailed("refused".into()))
            .await;

        let stream = ProgressStream::new(Arc::clone(&transport), ReconnectPolicy::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = stream.subscribe(ConnectionId::new(), tx);

        assert_eq!(
            rx.recv().await,
            Some(SubscriptionEvent::Reconnecting { attempt: 1 })
        );
        handle.cancel();

        // The worker dies during its backoff sleep; no second open happens
        assert_eq!(rx.recv().await, None);
        assert_eq!(transport.open_count().await, 1);
    }
}
