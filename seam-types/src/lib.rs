//! # seam-types
//!
//! Wire format types for Seam source connections and sync progress.
//!
//! This crate provides the foundational types used across all Seam crates:
//! - [`ConnectionId`], [`JobId`] - Identity types
//! - [`ConnectRequest`], [`CreateConnectionResponse`] - Connection API payloads
//! - [`AuthResult`], [`CallbackParams`] - Authorization completion messages
//! - [`StreamFrame`], [`ProgressUpdate`] - Progress stream frames
//! - [`SyncJob`], [`JobStatus`] - Background job listings
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod api;
mod auth;
mod error;
mod frames;
mod ids;
mod jobs;
mod progress;

pub use api::{ConnectRequest, ConnectionAuth, CreateConnectionResponse, OAuthAppCredentials};
pub use auth::{AuthResult, AuthStatus, CallbackParams, OAUTH_COMPLETE_TYPE};
pub use error::WireError;
pub use frames::StreamFrame;
pub use ids::{ConnectionId, JobId};
pub use jobs::{active_job, JobStatus, SyncJob};
pub use progress::ProgressUpdate;
