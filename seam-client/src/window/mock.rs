//! Mock window system for testing.
//!
//! Provides a controllable window system for testing flow logic without a
//! real browser or webview host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;

use super::{PopupHandle, PopupSpec, WindowError, WindowMessage, WindowSystem};

/// A mock window system for testing.
///
/// Allows tests to:
/// - Inspect which URLs were opened as popups
/// - Simulate the user closing a popup
/// - Simulate a blocked popup
/// - Inject messages as if posted by another window
/// - Inspect messages sent toward the opener
///
/// Clones share the same underlying windows and message bus, so a clone
/// handed to a driver can be observed from the test.
pub struct MockWindowSystem {
    inner: Arc<Mutex<MockWindowInner>>,
    message_tx: broadcast::Sender<WindowMessage>,
}

struct MockWindowInner {
    origin: String,
    next_handle: u64,
    open_windows: HashMap<u64, String>,
    opened_urls: Vec<String>,
    sent: Vec<(Value, String)>,
    block_next_open: bool,
    fail_next_send: Option<String>,
}

impl MockWindowSystem {
    /// Create a mock window system with the default test origin
    /// `https://app.example.com`.
    pub fn new() -> Self {
        Self::with_origin("https://app.example.com")
    }

    /// Create a mock window system with a specific origin.
    pub fn with_origin(origin: &str) -> Self {
        let (message_tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Mutex::new(MockWindowInner {
                origin: origin.to_string(),
                next_handle: 1,
                open_windows: HashMap::new(),
                opened_urls: Vec::new(),
                sent: Vec::new(),
                block_next_open: false,
                fail_next_send: None,
            })),
            message_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockWindowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `open` call fail as blocked.
    pub fn block_next_open(&self) {
        self.lock().block_next_open = true;
    }

    /// Make the next `send` call fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// All URLs passed to `open`, including blocked attempts.
    pub fn opened_urls(&self) -> Vec<String> {
        self.lock().opened_urls.clone()
    }

    /// Number of `open` calls that actually opened a window.
    pub fn open_count(&self) -> usize {
        self.lock().open_windows.len()
    }

    /// Handles of all currently open windows.
    pub fn open_handles(&self) -> Vec<PopupHandle> {
        let mut handles: Vec<u64> = self.lock().open_windows.keys().copied().collect();
        handles.sort_unstable();
        handles.into_iter().map(PopupHandle::from_raw).collect()
    }

    /// Simulate the user closing the window behind `handle`.
    pub fn close_from_user(&self, handle: PopupHandle) {
        self.lock().open_windows.remove(&handle.as_raw());
    }

    /// Inject a message as if another window posted it to this document.
    pub fn deliver_message(&self, origin: &str, payload: Value) {
        let _ = self.message_tx.send(WindowMessage {
            origin: origin.to_string(),
            payload,
        });
    }

    /// All payloads passed to `send`, with their target origins.
    pub fn sent_messages(&self) -> Vec<(Value, String)> {
        self.lock().sent.clone()
    }

    /// Clear all recorded state and close all windows.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.open_windows.clear();
        inner.opened_urls.clear();
        inner.sent.clear();
        inner.block_next_open = false;
        inner.fail_next_send = None;
    }
}

impl Default for MockWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockWindowSystem {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            message_tx: self.message_tx.clone(),
        }
    }
}

impl WindowSystem for MockWindowSystem {
    fn origin(&self) -> String {
        self.lock().origin.clone()
    }

    fn open(&self, url: &str, _spec: PopupSpec) -> Result<PopupHandle, WindowError> {
        let mut inner = self.lock();
        inner.opened_urls.push(url.to_string());
        if inner.block_next_open {
            inner.block_next_open = false;
            return Err(WindowError::PopupBlocked);
        }
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.open_windows.insert(handle, url.to_string());
        Ok(PopupHandle::from_raw(handle))
    }

    fn is_open(&self, handle: PopupHandle) -> bool {
        self.lock().open_windows.contains_key(&handle.as_raw())
    }

    fn close(&self, handle: PopupHandle) {
        self.lock().open_windows.remove(&handle.as_raw());
    }

    fn send(&self, payload: Value, target_origin: &str) -> Result<(), WindowError> {
        let origin = {
            let mut inner = self.lock();
            if let Some(error) = inner.fail_next_send.take() {
                return Err(WindowError::SendFailed(error));
            }
            inner.sent.push((payload.clone(), target_origin.to_string()));
            inner.origin.clone()
        };
        // Like postMessage: deliver only when the target origin matches
        // the receiving document, otherwise drop silently.
        if target_origin == "*" || target_origin == origin {
            let _ = self.message_tx.send(WindowMessage { origin, payload });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WindowMessage> {
        self.message_tx.subscribe()
    }
}
