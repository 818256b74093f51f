//! HTTP implementation of the connection API.

use reqwest::Client;

use async_trait::async_trait;
use seam_types::{ConnectRequest, ConnectionId, CreateConnectionResponse, SyncJob};

use super::{ApiError, ConnectApi};

/// [`ConnectApi`] over HTTP, backed by reqwest.
///
/// The default client carries no request timeout; callers that want one
/// can supply their own tuned client with [`HttpConnectApi::with_client`].
#[derive(Debug, Clone)]
pub struct HttpConnectApi {
    client: Client,
    base_url: String,
}

impl HttpConnectApi {
    /// Create an API client against the given base URL, with or without a
    /// trailing slash.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create an API client using a caller-configured reqwest client.
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ConnectApi for HttpConnectApi {
    async fn create_connection(
        &self,
        request: &ConnectRequest,
    ) -> Result<CreateConnectionResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/connections"))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn delete_connection(&self, id: &ConnectionId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("/connections/{}", id)))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn list_jobs(&self, id: &ConnectionId) -> Result<Vec<SyncJob>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/connections/{}/jobs", id)))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = HttpConnectApi::new("https://api.example.com/");
        assert_eq!(api.url("/connections"), "https://api.example.com/connections");

        let bare = HttpConnectApi::new("https://api.example.com");
        assert_eq!(bare.url("/connections"), "https://api.example.com/connections");
    }

    #[test]
    fn resource_paths_embed_the_id() {
        let api = HttpConnectApi::new("https://api.example.com");
        let id = ConnectionId::new();
        assert_eq!(
            api.url(&format!("/connections/{}/jobs", id)),
            format!("https://api.example.com/connections/{}/jobs", id)
        );
    }
}
