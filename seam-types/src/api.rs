//! Connection API payloads.

use serde::{Deserialize, Serialize};

use crate::ConnectionId;

/// Caller-supplied OAuth application credentials, for integrations where the
/// user brings their own OAuth app instead of the platform one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthAppCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

/// Request body for creating a source connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Target integration identifier (e.g. `"google_drive"`).
    pub integration: String,
    /// Human-readable connection name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Custom OAuth app credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_fields: Option<OAuthAppCredentials>,
    /// Redirect URI override for the authorization callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Integration-specific configuration values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_fields: Option<serde_json::Value>,
}

impl ConnectRequest {
    /// Create a request for the given integration with no extras.
    pub fn new(integration: &str) -> Self {
        Self {
            integration: integration.to_string(),
            name: None,
            auth_fields: None,
            redirect_uri: None,
            config_fields: None,
        }
    }

    /// Set the connection name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Supply custom OAuth app credentials.
    pub fn with_credentials(mut self, client_id: &str, client_secret: &str) -> Self {
        self.auth_fields = Some(OAuthAppCredentials {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        });
        self
    }

    /// Override the authorization redirect URI.
    pub fn with_redirect_uri(mut self, uri: &str) -> Self {
        self.redirect_uri = Some(uri.to_string());
        self
    }

    /// Attach integration-specific configuration.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config_fields = Some(config);
        self
    }
}

/// Authorization details returned with a freshly created connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectionAuth {
    /// URL the user must visit to authorize the connection. Absent for
    /// integrations that need no browser handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
}

/// Response body from connection creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConnectionResponse {
    /// Server-issued connection id.
    pub id: ConnectionId,
    /// Authorization details, when the integration requires a handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ConnectionAuth>,
}

impl CreateConnectionResponse {
    /// The authorization URL, if the response carried one.
    pub fn auth_url(&self) -> Option<&str> {
        self.auth.as_ref()?.auth_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builders() {
        let request = ConnectRequest::new("google_drive")
            .with_name("Team drive")
            .with_credentials("client-1", "secret-1")
            .with_redirect_uri("https://app.example.com/auth/callback");

        assert_eq!(request.integration, "google_drive");
        assert_eq!(request.name.as_deref(), Some("Team drive"));
        assert_eq!(request.auth_fields.unwrap().client_id, "client-1");
        assert_eq!(
            request.redirect_uri.as_deref(),
            Some("https://app.example.com/auth/callback")
        );
    }

    #[test]
    fn request_omits_absent_fields() {
        let json = serde_json::to_value(ConnectRequest::new("notion")).unwrap();
        assert_eq!(json["integration"], "notion");
        assert!(json.get("name").is_none());
        assert!(json.get("auth_fields").is_none());
        assert!(json.get("config_fields").is_none());
    }

    #[test]
    fn response_auth_url_helper() {
        let id = ConnectionId::new();
        let json = format!(
            r#"{{"id": "{}", "auth": {{"auth_url": "https://accounts.example.com/o/auth"}}}}"#,
            id
        );
        let response: CreateConnectionResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(
            response.auth_url(),
            Some("https://accounts.example.com/o/auth")
        );
    }

    #[test]
    fn response_auth_url_absent() {
        let no_auth = format!(r#"{{"id": "{}"}}"#, ConnectionId::new());
        let response: CreateConnectionResponse = serde_json::from_str(&no_auth).unwrap();
        assert!(response.auth_url().is_none());

        let empty_auth = format!(r#"{{"id": "{}", "auth": {{}}}}"#, ConnectionId::new());
        let response: CreateConnectionResponse = serde_json::from_str(&empty_auth).unwrap();
        assert!(response.auth_url().is_none());
    }
}
