//! Window system abstraction.
//!
//! The connect flow needs four things from its host: open a popup, check
//! whether it is still open, close it, and exchange messages with it. The
//! [`WindowSystem`] trait captures exactly that surface so the flow driver
//! runs unchanged against a browser shell, a native webview shell, or the
//! in-memory mock.
//!
//! All operations are synchronous. Window systems answer these calls from
//! local state, and keeping them synchronous lets the popup watchdog and
//! the completion bookkeeping run without yield points in between.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors reported by a window system.
#[derive(Debug, Error)]
pub enum WindowError {
    /// The host refused to open the popup.
    #[error("popup blocked by the host")]
    PopupBlocked,

    /// A message could not be posted.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Non-owning reference to a popup window.
///
/// Handles stay valid after the window closes; [`WindowSystem::is_open`]
/// reports the window's actual state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupHandle(u64);

impl PopupHandle {
    /// Wrap a host-assigned window id.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The host-assigned window id.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Size request for the authorization popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupSpec {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for PopupSpec {
    fn default() -> Self {
        Self {
            width: 600,
            height: 700,
        }
    }
}

impl PopupSpec {
    /// Top-left position that centers this popup over the opener window,
    /// clamped so the popup never starts off-screen.
    pub fn centered_on(&self, opener: WindowBounds) -> (i32, i32) {
        let left = opener.x + (opener.width as i32 - self.width as i32) / 2;
        let top = opener.y + (opener.height as i32 - self.height as i32) / 2;
        (left.max(0), top.max(0))
    }
}

/// On-screen bounds of the opener window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowBounds {
    /// Screen x of the opener's top-left corner.
    pub x: i32,
    /// Screen y of the opener's top-left corner.
    pub y: i32,
    /// Outer width of the opener.
    pub width: u32,
    /// Outer height of the opener.
    pub height: u32,
}

/// A message received by the hosting document.
#[derive(Debug, Clone)]
pub struct WindowMessage {
    /// Origin of the sending window, as `scheme://host[:port]`.
    pub origin: String,
    /// The structured payload.
    pub payload: Value,
}

/// Host integration surface for popups and cross-window messaging.
pub trait WindowSystem: Send + Sync {
    /// Origin of the hosting document, as `scheme://host[:port]`.
    fn origin(&self) -> String;

    /// Open a popup at `url`. Implementations position the window with
    /// [`PopupSpec::centered_on`] and their own bounds.
    ///
    /// Returns [`WindowError::PopupBlocked`] when the host refuses, which
    /// the flow treats as recoverable.
    fn open(&self, url: &str, spec: PopupSpec) -> Result<PopupHandle, WindowError>;

    /// Whether the window behind `handle` is still open.
    fn is_open(&self, handle: PopupHandle) -> bool;

    /// Close the window behind `handle`. Closing an already-closed window
    /// is a no-op.
    fn close(&self, handle: PopupHandle);

    /// Post `payload` to the opener window. The message is delivered only
    /// if the receiving document's origin equals `target_origin`.
    fn send(&self, payload: Value, target_origin: &str) -> Result<(), WindowError>;

    /// Stream of messages arriving at the hosting document.
    fn subscribe(&self) -> broadcast::Receiver<WindowMessage>;
}

mod mock;
pub use mock::MockWindowSystem;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_popup_spec() {
        let spec = PopupSpec::default();
        assert_eq!(spec.width, 600);
        assert_eq!(spec.height, 700);
    }

    #[test]
    fn centered_on_typical_desktop() {
        let spec = PopupSpec::default();
        let opener = WindowBounds {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        };
        assert_eq!(spec.centered_on(opener), (660, 190));
    }

    #[test]
    fn centered_on_offset_opener() {
        let spec = PopupSpec::default();
        let opener = WindowBounds {
            x: 100,
            y: 50,
            width: 800,
            height: 900,
        };
        assert_eq!(spec.centered_on(opener), (200, 150));
    }

    #[test]
    fn centered_clamps_to_screen_origin() {
        // Opener smaller than the popup would center it off-screen
        let spec = PopupSpec::default();
        let opener = WindowBounds {
            x: 10,
            y: 10,
            width: 400,
            height: 300,
        };
        assert_eq!(spec.centered_on(opener), (0, 0));
    }

    #[test]
    fn popup_handle_round_trip() {
        let handle = PopupHandle::from_raw(42);
        assert_eq!(handle.as_raw(), 42);
        assert_eq!(handle, PopupHandle::from_raw(42));
    }
}
