//! Frame classification for the progress event stream.
//!
//! Frames arrive as one JSON object per line. A `type` field selects the
//! control frames (`connected`, `heartbeat`, `error`); anything else is a
//! progress frame carrying raw counters.

use serde_json::Value;

use crate::{JobId, ProgressUpdate, WireError};

/// A single classified frame from the progress event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Stream established. Carries the authoritative job id, which replaces
    /// a stale tracked id on the consumer side.
    Connected {
        /// The job this stream reports on.
        job_id: JobId,
    },
    /// Keepalive. Consumers drop these.
    Heartbeat,
    /// Server-side failure; the job will not progress further.
    Error {
        /// Failure detail from the server.
        message: String,
    },
    /// Counter snapshot for the running job.
    Progress(ProgressUpdate),
}

impl StreamFrame {
    /// Classify one JSON frame.
    ///
    /// Objects without a recognized `type` value are progress frames; their
    /// missing counter fields default to zero.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| WireError::InvalidFrame(e.to_string()))?;

        match value.get("type").and_then(Value::as_str) {
            Some("connected") => {
                let raw = value
                    .get("job_id")
                    .and_then(Value::as_str)
                    .ok_or(WireError::MissingField("job_id"))?;
                let job_id = JobId::parse(raw).ok_or_else(|| WireError::InvalidField {
                    field: "job_id",
                    value: raw.to_string(),
                })?;
                Ok(Self::Connected { job_id })
            }
            Some("heartbeat") => Ok(Self::Heartbeat),
            Some("error") => {
                let message = value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(Value::as_str)
                    .unwrap_or("stream error")
                    .to_string();
                Ok(Self::Error { message })
            }
            _ => {
                let update: ProgressUpdate = serde_json::from_value(value)
                    .map_err(|e| WireError::InvalidFrame(e.to_string()))?;
                Ok(Self::Progress(update))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_frame_carries_job_id() {
        let job_id = JobId::new();
        let text = format!(r#"{{"type": "connected", "job_id": "{}"}}"#, job_id);
        let frame = StreamFrame::from_json(&text).unwrap();
        assert_eq!(frame, StreamFrame::Connected { job_id });
    }

    #[test]
    fn connected_frame_without_job_id_fails() {
        let result = StreamFrame::from_json(r#"{"type": "connected"}"#);
        assert!(matches!(result, Err(WireError::MissingField("job_id"))));
    }

    #[test]
    fn connected_frame_with_bad_job_id_fails() {
        let result = StreamFrame::from_json(r#"{"type": "connected", "job_id": "nope"}"#);
        assert!(matches!(
            result,
            Err(WireError::InvalidField { field: "job_id", .. })
        ));
    }

    #[test]
    fn heartbeat_frame() {
        let frame = StreamFrame::from_json(r#"{"type": "heartbeat"}"#).unwrap();
        assert_eq!(frame, StreamFrame::Heartbeat);
    }

    #[test]
    fn error_frame_prefers_message_field() {
        let frame =
            StreamFrame::from_json(r#"{"type": "error", "message": "token expired"}"#).unwrap();
        assert_eq!(
            frame,
            StreamFrame::Error {
                message: "token expired".into()
            }
        );
    }

    #[test]
    fn error_frame_falls_back_to_error_field() {
        let frame = StreamFrame::from_json(r#"{"type": "error", "error": "boom"}"#).unwrap();
        assert_eq!(
            frame,
            StreamFrame::Error {
                message: "boom".into()
            }
        );
    }

    #[test]
    fn untyped_frame_is_progress() {
        let frame = StreamFrame::from_json(r#"{"inserted": 50, "updated": 10}"#).unwrap();
        match frame {
            StreamFrame::Progress(update) => {
                assert_eq!(update.inserted, 50);
                assert_eq!(update.updated, 10);
                assert_eq!(update.kept, 0);
            }
            other => panic!("expected Progress, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_value_is_progress() {
        // Forward compatibility: unrecognized control frames parse as
        // (empty) progress rather than failing the stream.
        let frame = StreamFrame::from_json(r#"{"type": "announce"}"#).unwrap();
        assert!(matches!(frame, StreamFrame::Progress(_)));
    }

    #[test]
    fn terminal_progress_frame() {
        let frame = StreamFrame::from_json(r#"{"is_complete": true}"#).unwrap();
        match frame {
            StreamFrame::Progress(update) => assert!(update.is_terminal()),
            other => panic!("expected Progress, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_an_invalid_frame() {
        assert!(matches!(
            StreamFrame::from_json("not json"),
            Err(WireError::InvalidFrame(_))
        ));
    }
}
