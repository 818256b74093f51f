//! # seam-client
//!
//! Async drivers for Seam connect flows and sync progress tracking.
//!
//! Where `seam-core` decides and `seam-types` describes, this crate
//! acts: it talks to the Seam server over HTTP, opens and watches the
//! authorization popup, listens for the completion message, and keeps
//! progress streams alive across reconnects.
//!
//! ## Pieces
//!
//! - [`ConnectFlowController`] - runs one popup-mediated authorization
//!   flow end to end and reports the outcome as a [`FlowSignal`]
//! - [`SyncProgressRegistry`] - tracks background sync jobs for many
//!   connections, delivering [`SyncNotice`]s as frames arrive
//! - [`deliver_callback`] - the callback page's side of the handshake
//! - [`WindowSystem`] / [`ConnectApi`] / [`ProgressTransport`] - the
//!   seams to the host environment, with mock implementations for tests
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use seam_client::{ClientConfig, ConnectFlowController, HttpConnectApi};
//! use seam_types::ConnectRequest;
//!
//! let config = ClientConfig::from_file("seam.toml")?;
//! let api = Arc::new(HttpConnectApi::new(&config.api_base_url));
//! let (controller, mut signals) =
//!     ConnectFlowController::new(api, window, config.flow.clone());
//!
//! controller.initiate_oauth(ConnectRequest::new("google_drive")).await;
//! while let Some(signal) = signals.recv().await {
//!     println!("flow settled: {:?}", signal);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod callback;
pub mod channel;
pub mod config;
pub mod flow;
pub mod registry;
pub mod stream;
pub mod window;

pub use api::{ApiError, ConnectApi, HttpConnectApi, MockConnectApi};
pub use callback::{deliver_callback, CALLBACK_AUTO_CLOSE_DELAY};
pub use channel::AuthMessageChannel;
pub use config::{ClientConfig, ConfigError, FlowConfig, RegistryConfig, StreamConfig};
pub use flow::{ConnectFlowController, ConnectionAttempt, FlowSignal};
pub use registry::{SyncNotice, SyncProgressRegistry};
pub use stream::{
    FeedStep, HttpProgressTransport, MockProgressTransport, ProgressFeed, ProgressStream,
    ProgressTransport, StreamError, StreamHandle,
};
pub use window::{
    MockWindowSystem, PopupHandle, PopupSpec, WindowBounds, WindowError, WindowMessage,
    WindowSystem,
};
