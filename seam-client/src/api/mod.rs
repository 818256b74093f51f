//! Connection API client.
//!
//! The flow driver and the subscription registry talk to the Seam server
//! through the [`ConnectApi`] trait: create a connection, delete an
//! abandoned one, list its sync jobs. The HTTP implementation lives in
//! [`HttpConnectApi`]; tests use [`MockConnectApi`].

use async_trait::async_trait;
use thiserror::Error;

use seam_types::{ConnectRequest, ConnectionId, CreateConnectionResponse, SyncJob};

/// Errors that can occur during API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as failure detail.
        message: String,
    },

    /// The request failed before a response arrived.
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether this failure is a client-class (4xx) rejection, which
    /// retrying cannot fix.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }
}

/// Server API surface used by the connect flow and the registry.
#[async_trait]
pub trait ConnectApi: Send + Sync {
    /// Create a source connection and start its authorization.
    async fn create_connection(
        &self,
        request: &ConnectRequest,
    ) -> Result<CreateConnectionResponse, ApiError>;

    /// Delete a connection, cleaning up an abandoned attempt.
    async fn delete_connection(&self, id: &ConnectionId) -> Result<(), ApiError>;

    /// List the sync jobs recorded for a connection, newest first.
    async fn list_jobs(&self, id: &ConnectionId) -> Result<Vec<SyncJob>, ApiError>;
}

mod http;
mod mock;

pub use http::HttpConnectApi;
pub use mock::MockConnectApi;
