//! Cross-window completion channel.
//!
//! The authorization popup's callback page posts a single
//! `OAUTH_COMPLETE` message back to its opener. [`AuthMessageChannel`]
//! is the opener-side listener: it filters for same-origin messages,
//! parses the one recognized payload shape, and hands the first valid
//! result to the flow. Everything else is ignored, so foreign frames or
//! other machinery posting messages cannot affect a flow.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use seam_types::AuthResult;

use crate::window::WindowSystem;

/// Single-shot listener for the authorization completion message.
///
/// Stops on its own after delivering one valid result; [`close`] stops
/// it early. Dropping the channel also stops it, so no exit path can
/// leak a listener.
///
/// [`close`]: AuthMessageChannel::close
#[derive(Debug)]
pub struct AuthMessageChannel {
    task: JoinHandle<()>,
}

impl AuthMessageChannel {
    /// Start listening on `window` for a same-origin `OAUTH_COMPLETE`
    /// message and hand the first valid result to `on_result`.
    ///
    /// The closure body runs synchronously on the listener task before
    /// its returned future is awaited. Bookkeeping that must win a
    /// same-tick race against other tasks belongs in the body, ahead of
    /// the first await.
    pub fn open<W, F, Fut>(window: &W, on_result: F) -> Self
    where
        W: WindowSystem + ?Sized,
        F: FnOnce(AuthResult) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut messages = window.subscribe();
        let origin = window.origin();
        let task = tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => {
                        if message.origin != origin {
                            debug!(
                                from = %message.origin,
                                "ignoring window message from foreign origin"
                            );
                            continue;
                        }
                        let Some(result) = AuthResult::from_message(&message.payload) else {
                            continue;
                        };
                        on_result(result).await;
                        return;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth message listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        Self { task }
    }

    /// Stop listening without delivering anything.
    pub fn close(&self) {
        self.task.abort();
    }

    /// Whether the listener has stopped, either by delivering a result
    /// or by being closed.
    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AuthMessageChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}
