//! Mock progress transport for testing.
//!
//! Provides a scriptable transport for testing stream and registry logic
//! without a server.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use seam_types::{ConnectionId, StreamFrame};

use super::{ProgressFeed, ProgressTransport, StreamError};

/// One scripted step of a mock feed.
#[derive(Debug)]
pub enum FeedStep {
    /// Deliver a frame.
    Frame(StreamFrame),
    /// End the stream cleanly.
    Eof,
    /// Fail the read with the given message.
    Fail(String),
}

enum OpenScript {
    Fail(StreamError),
    Feed(Vec<FeedStep>),
}

/// A mock progress transport for testing.
///
/// Each `open` call consumes the next script: either a failure or a feed
/// that plays back its steps in order. A feed whose steps run out stays
/// open and quiet, and an `open` call with nothing scripted gets such a
/// feed; tests only script what they assert on. Clones share state.
pub struct MockProgressTransport {
    inner: Arc<Mutex<MockProgressInner>>,
}

#[derive(Default)]
struct MockProgressInner {
    scripts: VecDeque<OpenScript>,
    opened: Vec<ConnectionId>,
}

impl MockProgressTransport {
    /// Create a mock transport with nothing scripted.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockProgressInner::default())),
        }
    }

    /// Script the next `open` call to fail.
    pub async fn script_open_failure(&self, error: StreamError) {
        self.inner
            .lock()
            .await
            .scripts
            .push_back(OpenScript::Fail(error));
    }

    /// Script the next `open` call to yield a feed playing these steps.
    pub async fn script_feed(&self, steps: Vec<FeedStep>) {
        self.inner
            .lock()
            .await
            .scripts
            .push_back(OpenScript::Feed(steps));
    }

    /// Number of `open` calls so far.
    pub async fn open_count(&self) -> usize {
        self.inner.lock().await.opened.len()
    }

    /// Connection ids passed to `open`, in call order.
    pub async fn opened_ids(&self) -> Vec<ConnectionId> {
        self.inner.lock().await.opened.clone()
    }
}

impl Default for MockProgressTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockProgressTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ProgressTransport for MockProgressTransport {
    async fn open(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Box<dyn ProgressFeed>, StreamError> {
        let mut inner = self.inner.lock().await;
        inner.opened.push(*connection_id);
        match inner.scripts.pop_front() {
            Some(OpenScript::Fail(error)) => Err(error),
            Some(OpenScript::Feed(steps)) => Ok(Box::new(MockFeed {
                steps: steps.into(),
            })),
            None => Ok(Box::new(MockFeed {
                steps: VecDeque::new(),
            })),
        }
    }
}

struct MockFeed {
    steps: VecDeque<FeedStep>,
}

#[async_trait]
impl ProgressFeed for MockFeed {
    async fn next(&mut self) -> Result<Option<StreamFrame>, StreamError> {
        match self.steps.pop_front() {
            Some(FeedStep::Frame(frame)) => Ok(Some(frame)),
            Some(FeedStep::Eof) => Ok(None),
            Some(FeedStep::Fail(message)) => Err(StreamError::ReadFailed(message)),
            // Out of steps: stay open and quiet
            None => std::future::pending().await,
        }
    }
}
