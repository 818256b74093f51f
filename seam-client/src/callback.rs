//! OAuth callback page handler.
//!
//! The provider redirects the popup to the callback page with the
//! outcome in the query string. [`deliver_callback`] parses it and
//! posts the completion message to the opener, addressed strictly to
//! our own origin so no other page can intercept it. The host is
//! expected to close the page [`CALLBACK_AUTO_CLOSE_DELAY`] after a
//! successful delivery, leaving the user a moment to read the outcome.

use serde_json::Value;

use seam_types::{CallbackParams, WireError};
use tracing::warn;

use crate::window::WindowSystem;

pub use seam_core::CALLBACK_AUTO_CLOSE_DELAY;

/// Parse the callback query string and post the completion message to
/// the opener.
///
/// Returns the parsed parameters so the page can render the outcome.
/// A failed post is logged and swallowed: the window watchdog covers
/// flows whose message never arrives.
pub fn deliver_callback<W>(window: &W, query: &str) -> Result<CallbackParams, WireError>
where
    W: WindowSystem + ?Sized,
{
    let params = CallbackParams::from_query(query)?;
    let message: Value = params.to_message();
    let origin = window.origin();
    if let Err(e) = window.send(message, &origin) {
        warn!("failed to post completion to opener: {}", e);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::MockWindowSystem;
    use seam_types::{AuthResult, AuthStatus, ConnectionId};

    #[tokio::test]
    async fn posts_completion_to_own_origin() {
        let window = MockWindowSystem::new();
        let mut messages = window.subscribe();
        let connection = ConnectionId::new();

        let query = format!("status=success&source_connection_id={}", connection);
        let params = deliver_callback(&window, &query).unwrap();
        assert_eq!(params.status, AuthStatus::Success);

        // The loopback proves the message was addressed to our origin
        let delivered = messages.recv().await.unwrap();
        assert_eq!(delivered.origin, "https://app.example.com");
        let result = AuthResult::from_message(&delivered.payload).unwrap();
        assert!(result.is_success());
        assert_eq!(result.connection_id, Some(connection));
    }

    #[tokio::test]
    async fn error_outcome_carries_details() {
        let window = MockWindowSystem::new();
        let mut messages = window.subscribe();

        let params = deliver_callback(
            &window,
            "status=error&error_type=access_denied&error_message=User%20declined",
        )
        .unwrap();
        assert_eq!(params.status, AuthStatus::Error);

        let delivered = messages.recv().await.unwrap();
        let result = AuthResult::from_message(&delivered.payload).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.error_type.as_deref(), Some("access_denied"));
        assert_eq!(result.error_message.as_deref(), Some("User declined"));
    }

    #[tokio::test]
    async fn missing_status_is_rejected() {
        let window = MockWindowSystem::new();

        let err = deliver_callback(&window, "source_connection_id=abc").unwrap_err();
        assert!(matches!(err, WireError::MissingField("status")));
        assert!(window.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn failed_post_is_swallowed() {
        let window = MockWindowSystem::new();
        window.fail_next_send("opener gone");

        let params = deliver_callback(&window, "status=success");
        assert!(params.is_ok());
    }
}
