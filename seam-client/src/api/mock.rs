//! Mock connection API for testing.
//!
//! Provides a scriptable API implementation for testing flow and registry
//! logic without a server.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use seam_types::{ConnectRequest, ConnectionId, CreateConnectionResponse, SyncJob};

use super::{ApiError, ConnectApi};

/// A mock connection API for testing.
///
/// Allows tests to:
/// - Queue create-connection responses
/// - Queue job listings (one listing per `list_jobs` call)
/// - Simulate failures on the next call
/// - Inspect recorded requests
///
/// An unqueued `list_jobs` call returns an empty listing, so lookup-retry
/// tests only script the calls they care about. Clones share state.
pub struct MockConnectApi {
    inner: Arc<Mutex<MockConnectApiInner>>,
}

#[derive(Default)]
struct MockConnectApiInner {
    create_responses: VecDeque<CreateConnectionResponse>,
    job_listings: VecDeque<Vec<SyncJob>>,
    created: Vec<ConnectRequest>,
    deleted: Vec<ConnectionId>,
    job_queries: Vec<ConnectionId>,
    fail_next_create: Option<String>,
    fail_next_delete: Option<String>,
    fail_next_jobs: Option<String>,
}

impl MockConnectApi {
    /// Create a mock API with nothing queued.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockConnectApiInner::default())),
        }
    }

    /// Queue a response for the next `create_connection` call.
    pub async fn queue_create_response(&self, response: CreateConnectionResponse) {
        self.inner.lock().await.create_responses.push_back(response);
    }

    /// Queue a listing for the next `list_jobs` call.
    pub async fn queue_jobs(&self, jobs: Vec<SyncJob>) {
        self.inner.lock().await.job_listings.push_back(jobs);
    }

    /// Make the next `create_connection` call fail.
    pub async fn fail_next_create(&self, error: &str) {
        self.inner.lock().await.fail_next_create = Some(error.to_string());
    }

    /// Make the next `delete_connection` call fail.
    pub async fn fail_next_delete(&self, error: &str) {
        self.inner.lock().await.fail_next_delete = Some(error.to_string());
    }

    /// Make the next `list_jobs` call fail.
    pub async fn fail_next_jobs(&self, error: &str) {
        self.inner.lock().await.fail_next_jobs = Some(error.to_string());
    }

    /// All requests passed to `create_connection`.
    pub async fn created_requests(&self) -> Vec<ConnectRequest> {
        self.inner.lock().await.created.clone()
    }

    /// All ids passed to `delete_connection`.
    pub async fn deleted_ids(&self) -> Vec<ConnectionId> {
        self.inner.lock().await.deleted.clone()
    }

    /// Number of `list_jobs` calls so far.
    pub async fn job_query_count(&self) -> usize {
        self.inner.lock().await.job_queries.len()
    }

    /// Clear all queues and recorded calls.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        *inner = MockConnectApiInner::default();
    }
}

impl Default for MockConnectApi {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockConnectApi {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ConnectApi for MockConnectApi {
    async fn create_connection(
        &self,
        request: &ConnectRequest,
    ) -> Result<CreateConnectionResponse, ApiError> {
        let mut inner = self.inner.lock().await;
        inner.created.push(request.clone());
        if let Some(error) = inner.fail_next_create.take() {
            return Err(ApiError::Transport(error));
        }
        inner
            .create_responses
            .pop_front()
            .ok_or_else(|| ApiError::Transport("no create response queued".to_string()))
    }

    async fn delete_connection(&self, id: &ConnectionId) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().await;
        inner.deleted.push(*id);
        if let Some(error) = inner.fail_next_delete.take() {
            return Err(ApiError::Transport(error));
        }
        Ok(())
    }

    async fn list_jobs(&self, id: &ConnectionId) -> Result<Vec<SyncJob>, ApiError> {
        let mut inner = self.inner.lock().await;
        inner.job_queries.push(*id);
        if let Some(error) = inner.fail_next_jobs.take() {
            return Err(ApiError::Transport(error));
        }
        Ok(inner.job_listings.pop_front().unwrap_or_default())
    }
}
