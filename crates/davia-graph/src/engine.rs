//! Execution engine port

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl EngineError {
    /// Worth another attempt: connection trouble or a 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<EngineError> for davia_core::Error {
    fn from(e: EngineError) -> Self {
        davia_core::Error::Engine(e.to_string())
    }
}

/// One run of a graph.
#[derive(Clone, Debug, Serialize)]
pub struct RunRequest {
    pub graph_id: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl RunRequest {
    pub fn new(graph_id: impl Into<String>, input: Value) -> Self {
        Self {
            graph_id: graph_id.into(),
            input,
            thread_id: None,
        }
    }

    pub fn on_thread(mut self, thread_id: Option<String>) -> Self {
        self.thread_id = thread_id;
        self
    }
}

/// Content of a streamed AI message chunk: a flat string or a list of parts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageChunk {
    pub content: MessageContent,
}

impl MessageChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn parts(parts: Vec<Value>) -> Self {
        Self {
            content: MessageContent::Parts(parts),
        }
    }

    /// The text this chunk contributes to the client, if any.
    ///
    /// A flat string counts when non-empty. A part list counts only when its
    /// first part is `{"type": "text", "text": <non-empty>}`.
    pub fn text_delta(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) if !text.is_empty() => Some(text),
            MessageContent::Text(_) => None,
            MessageContent::Parts(parts) => {
                let first = parts.first()?;
                if first.get("type").and_then(Value::as_str) != Some("text") {
                    return None;
                }
                first
                    .get("text")
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
            }
        }
    }
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = EngineResult<MessageChunk>> + Send>>;

/// Something that can run a graph and report on its threads.
#[async_trait::async_trait]
pub trait ExecutionEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Start a run and stream its AI message chunks. Cancelling `cancel`
    /// drops the underlying connection and ends the stream.
    async fn stream_run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> EngineResult<ChunkStream>;

    async fn thread_state(&self, thread_id: &str) -> EngineResult<Value>;
}
