//! Authorization completion messages.
//!
//! The callback page receives the handshake outcome as query parameters,
//! then posts a single structured message to its opener. Both shapes live
//! here: [`CallbackParams`] (the query side) and [`AuthResult`] (the
//! normalized message side).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConnectionId, WireError};

/// The one message type exchanged between the popup and its opener.
pub const OAUTH_COMPLETE_TYPE: &str = "OAUTH_COMPLETE";

/// Outcome of the authorization handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// The provider granted access.
    Success,
    /// The provider denied access or the handshake failed.
    Error,
}

impl AuthStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Normalized authorization result, as delivered to the flow controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// Handshake outcome.
    pub status: AuthStatus,
    /// The connection that was authorized, when the callback carried it.
    pub connection_id: Option<ConnectionId>,
    /// Machine-readable failure category.
    pub error_type: Option<String>,
    /// Human-readable failure detail.
    pub error_message: Option<String>,
}

impl AuthResult {
    /// Whether the handshake succeeded.
    pub fn is_success(&self) -> bool {
        self.status == AuthStatus::Success
    }

    /// Parse a raw window message. Returns `None` for anything that is not
    /// a well-formed `OAUTH_COMPLETE` payload; callers ignore those.
    pub fn from_message(payload: &Value) -> Option<Self> {
        if payload.get("type")?.as_str()? != OAUTH_COMPLETE_TYPE {
            return None;
        }
        let status = AuthStatus::parse(payload.get("status")?.as_str()?)?;
        let connection_id = payload
            .get("source_connection_id")
            .and_then(Value::as_str)
            .and_then(ConnectionId::parse);
        let error_type = payload
            .get("error_type")
            .and_then(Value::as_str)
            .map(str::to_string);
        let error_message = payload
            .get("error_message")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            status,
            connection_id,
            error_type,
            error_message,
        })
    }

    /// A display message for the error case.
    pub fn error_text(&self) -> String {
        if let Some(message) = &self.error_message {
            return message.clone();
        }
        match &self.error_type {
            Some(kind) => format!("Authorization failed: {}", kind),
            None => "Authorization failed".to_string(),
        }
    }
}

/// Query parameters received by the authorization callback page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
    /// Handshake outcome.
    pub status: AuthStatus,
    /// The connection that was authorized.
    pub source_connection_id: Option<ConnectionId>,
    /// Machine-readable failure category.
    pub error_type: Option<String>,
    /// Human-readable failure detail.
    pub error_message: Option<String>,
}

impl CallbackParams {
    /// Parse the callback page's query string (with or without a leading
    /// `?`). `status` is required; everything else is optional.
    pub fn from_query(query: &str) -> Result<Self, WireError> {
        let query = query.strip_prefix('?').unwrap_or(query);

        let mut status = None;
        let mut source_connection_id = None;
        let mut error_type = None;
        let mut error_message = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "status" => {
                    status = Some(AuthStatus::parse(&value).ok_or(WireError::InvalidField {
                        field: "status",
                        value: value.to_string(),
                    })?)
                }
                "source_connection_id" => {
                    source_connection_id = ConnectionId::parse(&value);
                }
                "error_type" => error_type = Some(value.to_string()),
                "error_message" => error_message = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            status: status.ok_or(WireError::MissingField("status"))?,
            source_connection_id,
            error_type,
            error_message,
        })
    }

    /// Build the `OAUTH_COMPLETE` message this page posts to its opener.
    /// Absent fields are omitted rather than sent as null.
    pub fn to_message(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("type".into(), OAUTH_COMPLETE_TYPE.into());
        fields.insert("status".into(), self.status.as_str().into());
        if let Some(id) = &self.source_connection_id {
            fields.insert("source_connection_id".into(), id.to_string().into());
        }
        if let Some(kind) = &self.error_type {
            fields.insert("error_type".into(), kind.clone().into());
        }
        if let Some(message) = &self.error_message {
            fields.insert("error_message".into(), message.clone().into());
        }
        Value::Object(fields)
    }
}

impl From<CallbackParams> for AuthResult {
    fn from(params: CallbackParams) -> Self {
        Self {
            status: params.status,
            connection_id: params.source_connection_id,
            error_type: params.error_type,
            error_message: params.error_message,
        }
    }
}
