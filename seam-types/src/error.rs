//! Error types for Seam wire parsing.

use thiserror::Error;

/// Errors that can occur while parsing Seam wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// A required field was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field was present but unparseable.
    #[error("invalid field {field}: {value}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The value that failed to parse.
        value: String,
    },

    /// Frame body was not valid JSON or did not match any frame shape.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::MissingField("status");
        assert_eq!(err.to_string(), "missing field: status");

        let err = WireError::InvalidField {
            field: "status",
            value: "maybe".into(),
        };
        assert_eq!(err.to_string(), "invalid field status: maybe");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
