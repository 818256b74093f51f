//! # seam-core
//!
//! Pure state machines for Seam connect flows (no I/O, instant tests).
//!
//! This crate implements the popup-mediated OAuth connect flow and the
//! sync progress subscription lifecycle without any network or window
//! access, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (HTTP, popup windows, timers) is performed by
//! `seam-client`, which interprets the actions produced by these state
//! machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod flow;
pub mod retry;
pub mod subscription;

pub use flow::{FlowAction, FlowEvent, FlowSignal, FlowState, MISSING_AUTH_URL_ERROR};
pub use retry::{
    JobLookupPolicy, ReconnectPolicy, CALLBACK_AUTO_CLOSE_DELAY, GRACE_REMOVAL_DELAY,
    WATCHDOG_INTERVAL,
};
pub use subscription::{
    SubscriptionAction, SubscriptionEvent, SubscriptionStatus, SyncSubscription,
};
