//! Identity types for Seam.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a source connection.
///
/// Issued by the server when a connection is created. UUID v4 format,
/// serialized as its canonical string form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Create a new random ConnectionId (for tests and mock servers).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse a ConnectionId from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// A unique identifier for a background sync job.
///
/// UUID v4 format, serialized as its canonical string form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(uuid::Uuid);

impl JobId {
    /// Create a new random JobId (for tests and mock servers).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse a JobId from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}
