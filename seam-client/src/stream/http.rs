//! HTTP implementation of the progress transport.
//!
//! The server exposes progress as a streaming GET response with one JSON
//! frame per line. SSE dressing is tolerated: `data:` prefixes are
//! stripped, comment lines (leading `:`) and blank separators are
//! skipped. Lines that still fail to parse are dropped rather than
//! killing the stream, so one malformed frame cannot take down a
//! subscription.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;

use async_trait::async_trait;
use tracing::debug;

use seam_types::{ConnectionId, StreamFrame};

use super::{ProgressFeed, ProgressTransport, StreamError};

type ByteChunks = BoxStream<'static, Result<Vec<u8>, String>>;

/// [`ProgressTransport`] over HTTP, backed by reqwest.
///
/// The default client carries no request timeout, which a long-lived
/// stream requires. Callers that want a connect timeout can supply a
/// tuned client with [`HttpProgressTransport::with_client`].
#[derive(Debug, Clone)]
pub struct HttpProgressTransport {
    client: Client,
    base_url: String,
}

impl HttpProgressTransport {
    /// Create a transport against the given base URL.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a transport using a caller-configured reqwest client.
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, connection_id: &ConnectionId) -> String {
        format!("{}/connections/{}/progress", self.base_url, connection_id)
    }
}

#[async_trait]
impl ProgressTransport for HttpProgressTransport {
    async fn open(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Box<dyn ProgressFeed>, StreamError> {
        let response = self
            .client
            .get(self.url(connection_id))
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| StreamError::OpenFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(StreamError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(StreamError::OpenFailed(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let chunks = response
            .bytes_stream()
            .map(|result| {
                result
                    .map(|chunk| chunk.to_vec())
                    .map_err(|e| e.to_string())
            })
            .boxed();
        Ok(Box::new(LineFramedFeed::new(chunks)))
    }
}

/// Splits a byte stream into lines and classifies each as a frame.
struct LineFramedFeed {
    chunks: ByteChunks,
    buffer: Vec<u8>,
}

impl LineFramedFeed {
    fn new(chunks: ByteChunks) -> Self {
        Self {
            chunks,
            buffer: Vec::new(),
        }
    }
}

#[async_trait]
impl ProgressFeed for LineFramedFeed {
    async fn next(&mut self) -> Result<Option<StreamFrame>, StreamError> {
        loop {
            // Drain complete lines already buffered
            while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if let Some(frame) = parse_frame_line(&line) {
                    return Ok(Some(frame));
                }
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(StreamError::ReadFailed(e)),
                None => {
                    // The final line may arrive without a trailing newline
                    let line = std::mem::take(&mut self.buffer);
                    if let Some(frame) = parse_frame_line(&line) {
                        return Ok(Some(frame));
                    }
                    return Ok(None);
                }
            }
        }
    }
}

fn parse_frame_line(line: &[u8]) -> Option<StreamFrame> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() || text.starts_with(':') {
        return None;
    }
    let payload = text.strip_prefix("data:").map(str::trim_start).unwrap_or(text);
    match StreamFrame::from_json(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            debug!("dropping unparseable frame: {}", e);
            None
        }
    }
}
