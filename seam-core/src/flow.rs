//! Connect flow state machine for Seam.
//!
//! This module provides a pure, side-effect-free state machine for the
//! popup-mediated OAuth connect flow. The state machine takes events as
//! input and produces a new state plus a list of actions to execute.
//!
//! The actual I/O (HTTP calls, window opening, timers) is performed by
//! seam-client, not by this module. This enables instant unit testing
//! without browser or network mocks.

use seam_types::{AuthResult, ConnectionId};

/// Error message used when connection creation returns 200 but the
/// response carries no authorization URL.
pub const MISSING_AUTH_URL_ERROR: &str = "Failed to get authorization URL. Please try again.";

/// Connect flow state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// No flow in progress.
    Idle,
    /// Connection creation request in flight.
    Creating,
    /// Popup open (or manual link followed), awaiting the completion message.
    Waiting,
    /// The browser refused to open the popup; a manual fallback is offered.
    PopupBlocked {
        /// Authorization URL kept for retry and the manual link.
        auth_url: String,
    },
    /// The flow failed; the user may re-initiate.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl FlowState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (seam-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: FlowEvent) -> (Self, Vec<FlowAction>) {
        match (self, event) {
            // From Idle (or Error: the user may re-invoke after a failure)
            (Self::Idle | Self::Error { .. }, FlowEvent::Initiated) => {
                (Self::Creating, vec![FlowAction::CreateConnection])
            }

            // From Creating
            (
                Self::Creating,
                FlowEvent::ConnectionCreated {
                    auth_url: Some(auth_url),
                },
            ) => (Self::Creating, vec![FlowAction::OpenPopup { auth_url }]),
            (Self::Creating, FlowEvent::ConnectionCreated { auth_url: None }) => (
                Self::Error {
                    message: MISSING_AUTH_URL_ERROR.to_string(),
                },
                vec![FlowAction::Emit(FlowSignal::Failed {
                    message: MISSING_AUTH_URL_ERROR.to_string(),
                })],
            ),
            (Self::Creating, FlowEvent::CreateFailed { message }) => (
                Self::Error {
                    message: message.clone(),
                },
                vec![FlowAction::Emit(FlowSignal::Failed { message })],
            ),

            // Popup outcomes, both for the first open and for retries
            (Self::Creating | Self::PopupBlocked { .. }, FlowEvent::PopupOpened) => {
                (Self::Waiting, vec![FlowAction::StartWatchdog])
            }
            (Self::Creating | Self::PopupBlocked { .. }, FlowEvent::PopupDenied { auth_url }) => {
                (Self::PopupBlocked { auth_url }, vec![])
            }

            // From PopupBlocked
            (Self::PopupBlocked { auth_url }, FlowEvent::RetryRequested) => {
                let open = FlowAction::OpenPopup {
                    auth_url: auth_url.clone(),
                };
                (Self::PopupBlocked { auth_url }, vec![open])
            }
            (Self::PopupBlocked { .. }, FlowEvent::ManualLinkOpened) => {
                (Self::Waiting, vec![FlowAction::StartWatchdog])
            }

            // Completion. The popup can finish while the opener is still in
            // Creating or PopupBlocked, so all in-flight states accept it.
            (
                Self::Creating | Self::Waiting | Self::PopupBlocked { .. },
                FlowEvent::Completed { result },
            ) => {
                if result.is_success() {
                    (
                        Self::Idle,
                        vec![
                            FlowAction::StopWatchdog,
                            FlowAction::ClosePopup,
                            FlowAction::Emit(FlowSignal::Completed {
                                connection_id: result.connection_id,
                            }),
                        ],
                    )
                } else {
                    let message = result.error_text();
                    (
                        Self::Error {
                            message: message.clone(),
                        },
                        vec![
                            FlowAction::StopWatchdog,
                            FlowAction::ClosePopup,
                            FlowAction::Emit(FlowSignal::Failed { message }),
                        ],
                    )
                }
            }

            // Cancellation: watchdog-detected popup close or explicit cancel
            (
                Self::Creating | Self::Waiting | Self::PopupBlocked { .. },
                FlowEvent::Cancelled,
            ) => (
                Self::Idle,
                vec![
                    FlowAction::StopWatchdog,
                    FlowAction::ClosePopup,
                    FlowAction::DeleteConnection,
                    FlowAction::Emit(FlowSignal::Cancelled),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a flow is currently in progress.
    pub fn in_flight(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Waiting | Self::PopupBlocked { .. }
        )
    }

    /// Authorization URL recorded when the popup was blocked.
    pub fn blocked_auth_url(&self) -> Option<&str> {
        match self {
            Self::PopupBlocked { auth_url } => Some(auth_url),
            _ => None,
        }
    }

    /// Failure description when the flow has errored.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur during a connect flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// User started the connect flow.
    Initiated,
    /// Connection creation succeeded server-side.
    ConnectionCreated {
        /// Authorization URL from the response, when present.
        auth_url: Option<String>,
    },
    /// Connection creation failed.
    CreateFailed {
        /// Error message describing the failure.
        message: String,
    },
    /// The popup window opened.
    PopupOpened,
    /// The browser refused to open the popup.
    PopupDenied {
        /// Authorization URL kept for retry and the manual fallback.
        auth_url: String,
    },
    /// User asked to retry opening the blocked popup.
    RetryRequested,
    /// User followed the manual authorization link instead of the popup.
    ManualLinkOpened,
    /// A validated completion message arrived from the popup.
    Completed {
        /// Normalized completion payload.
        result: AuthResult,
    },
    /// The flow was abandoned: popup closed by the user, or explicit cancel.
    Cancelled,
}

/// Actions to be executed by seam-client.
///
/// These are instructions, not side effects. The client interprets these
/// and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    /// Create the connection server-side.
    CreateConnection,
    /// Open the authorization popup at the given URL.
    OpenPopup {
        /// Authorization URL to load.
        auth_url: String,
    },
    /// Start the popup-closed watchdog.
    StartWatchdog,
    /// Stop the popup-closed watchdog.
    StopWatchdog,
    /// Close the popup if still open.
    ClosePopup,
    /// Delete the half-created connection server-side (best-effort).
    DeleteConnection,
    /// Emit a signal to the application.
    Emit(FlowSignal),
}

/// Signals emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowSignal {
    /// Authorization completed successfully.
    Completed {
        /// Connection id carried by the completion message, when present.
        connection_id: Option<ConnectionId>,
    },
    /// The user abandoned the flow.
    Cancelled,
    /// The flow failed.
    Failed {
        /// Human-readable failure description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use seam_types::AuthStatus;

    fn success_result(connection_id: Option<ConnectionId>) -> AuthResult {
        AuthResult {
            status: AuthStatus::Success,
            connection_id,
            error_type: None,
            error_message: None,
        }
    }

    fn failure_result(message: &str) -> AuthResult {
        AuthResult {
            status: AuthStatus::Error,
            connection_id: None,
            error_type: Some("access_denied".to_string()),
            error_message: Some(message.to_string()),
        }
    }

    #[test]
    fn starts_idle() {
        let state = FlowState::new();
        assert!(matches!(state, FlowState::Idle));
        assert!(!state.in_flight());
    }

    #[test]
    fn initiate_transitions_to_creating() {
        let state = FlowState::Idle;
        let (new_state, actions) = state.on_event(FlowEvent::Initiated);

        assert!(matches!(new_state, FlowState::Creating));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::CreateConnection)));
    }

    #[test]
    fn initiate_allowed_again_after_error() {
        let state = FlowState::Error {
            message: "boom".into(),
        };
        let (new_state, actions) = state.on_event(FlowEvent::Initiated);

        assert!(matches!(new_state, FlowState::Creating));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::CreateConnection)));
    }

    #[test]
    fn initiate_ignored_while_in_flight() {
        for state in [
            FlowState::Creating,
            FlowState::Waiting,
            FlowState::PopupBlocked {
                auth_url: "https://auth.example/x".into(),
            },
        ] {
            let (new_state, actions) = state.clone().on_event(FlowEvent::Initiated);
            assert_eq!(new_state, state);
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn created_with_auth_url_opens_popup() {
        let state = FlowState::Creating;
        let (new_state, actions) = state.on_event(FlowEvent::ConnectionCreated {
            auth_url: Some("https://auth.example/consent".into()),
        });

        assert!(matches!(new_state, FlowState::Creating));
        assert!(actions.iter().any(|a| matches!(
            a,
            FlowAction::OpenPopup { auth_url } if auth_url == "https://auth.example/consent"
        )));
    }

    #[test]
    fn created_without_auth_url_is_an_error() {
        let state = FlowState::Creating;
        let (new_state, actions) =
            state.on_event(FlowEvent::ConnectionCreated { auth_url: None });

        match &new_state {
            FlowState::Error { message } => {
                assert_eq!(message, "Failed to get authorization URL. Please try again.");
            }
            other => panic!("expected Error state, got {:?}", other),
        }
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::Emit(FlowSignal::Failed { .. }))));
    }

    #[test]
    fn create_failure_surfaces_message() {
        let state = FlowState::Creating;
        let (new_state, actions) = state.on_event(FlowEvent::CreateFailed {
            message: "network unreachable".into(),
        });

        assert!(matches!(
            new_state,
            FlowState::Error { ref message } if message == "network unreachable"
        ));
        assert!(actions.iter().any(|a| matches!(
            a,
            FlowAction::Emit(FlowSignal::Failed { message }) if message == "network unreachable"
        )));
    }

    #[test]
    fn popup_opened_starts_watchdog() {
        let state = FlowState::Creating;
        let (new_state, actions) = state.on_event(FlowEvent::PopupOpened);

        assert!(matches!(new_state, FlowState::Waiting));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::StartWatchdog)));
    }

    #[test]
    fn blocked_popup_records_url_without_erroring() {
        let state = FlowState::Creating;
        let (new_state, actions) = state.on_event(FlowEvent::PopupDenied {
            auth_url: "https://auth.example/consent".into(),
        });

        assert_eq!(
            new_state.blocked_auth_url(),
            Some("https://auth.example/consent")
        );
        // Popup blocked is recoverable, not a hard error
        assert!(actions.is_empty());
    }

    #[test]
    fn retry_reopens_stored_url() {
        let state = FlowState::PopupBlocked {
            auth_url: "https://auth.example/consent".into(),
        };
        let (new_state, actions) = state.on_event(FlowEvent::RetryRequested);

        assert!(matches!(new_state, FlowState::PopupBlocked { .. }));
        assert!(actions.iter().any(|a| matches!(
            a,
            FlowAction::OpenPopup { auth_url } if auth_url == "https://auth.example/consent"
        )));

        // A successful open then enters Waiting
        let (new_state, actions) = new_state.on_event(FlowEvent::PopupOpened);
        assert!(matches!(new_state, FlowState::Waiting));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::StartWatchdog)));
    }

    #[test]
    fn manual_link_counts_as_waiting() {
        let state = FlowState::PopupBlocked {
            auth_url: "https://auth.example/consent".into(),
        };
        let (new_state, actions) = state.on_event(FlowEvent::ManualLinkOpened);

        assert!(matches!(new_state, FlowState::Waiting));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::StartWatchdog)));
    }

    #[test]
    fn success_completion_returns_to_idle() {
        let id = ConnectionId::new();
        let state = FlowState::Waiting;
        let (new_state, actions) = state.on_event(FlowEvent::Completed {
            result: success_result(Some(id)),
        });

        assert!(matches!(new_state, FlowState::Idle));
        assert!(actions.iter().any(|a| matches!(a, FlowAction::StopWatchdog)));
        assert!(actions.iter().any(|a| matches!(a, FlowAction::ClosePopup)));
        assert!(actions.iter().any(|a| matches!(
            a,
            FlowAction::Emit(FlowSignal::Completed { connection_id }) if *connection_id == Some(id)
        )));
        // Success never deletes the created connection
        assert!(!actions
            .iter()
            .any(|a| matches!(a, FlowAction::DeleteConnection)));
    }

    #[test]
    fn failed_completion_carries_error_text() {
        let state = FlowState::Waiting;
        let (new_state, actions) = state.on_event(FlowEvent::Completed {
            result: failure_result("consent was denied"),
        });

        assert!(matches!(
            new_state,
            FlowState::Error { ref message } if message == "consent was denied"
        ));
        assert!(actions.iter().any(|a| matches!(a, FlowAction::ClosePopup)));
        assert!(actions.iter().any(|a| matches!(
            a,
            FlowAction::Emit(FlowSignal::Failed { message }) if message == "consent was denied"
        )));
    }

    #[test]
    fn completion_accepted_before_popup_settles() {
        // The callback can post back before the opener observed PopupOpened
        let state = FlowState::Creating;
        let (new_state, actions) = state.on_event(FlowEvent::Completed {
            result: success_result(None),
        });

        assert!(matches!(new_state, FlowState::Idle));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::Emit(FlowSignal::Completed { .. }))));
    }

    #[test]
    fn cancel_deletes_pending_connection() {
        let state = FlowState::Waiting;
        let (new_state, actions) = state.on_event(FlowEvent::Cancelled);

        assert!(matches!(new_state, FlowState::Idle));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::DeleteConnection)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, FlowAction::Emit(FlowSignal::Cancelled))));
    }

    #[test]
    fn cancel_ignored_when_idle() {
        let state = FlowState::Idle;
        let (new_state, actions) = state.on_event(FlowEvent::Cancelled);

        assert!(matches!(new_state, FlowState::Idle));
        assert!(actions.is_empty());
    }

    #[test]
    fn full_happy_path() {
        let state = FlowState::new();

        let (state, _) = state.on_event(FlowEvent::Initiated);
        assert!(matches!(state, FlowState::Creating));

        let (state, _) = state.on_event(FlowEvent::ConnectionCreated {
            auth_url: Some("https://auth.example/consent".into()),
        });
        assert!(matches!(state, FlowState::Creating));

        let (state, _) = state.on_event(FlowEvent::PopupOpened);
        assert!(matches!(state, FlowState::Waiting));
        assert!(state.in_flight());

        let (state, _) = state.on_event(FlowEvent::Completed {
            result: success_result(Some(ConnectionId::new())),
        });
        assert!(matches!(state, FlowState::Idle));
    }

    #[test]
    fn error_message_helper() {
        assert_eq!(FlowState::Idle.error_message(), None);
        assert_eq!(
            FlowState::Error {
                message: "nope".into()
            }
            .error_message(),
            Some("nope")
        );
    }
}
