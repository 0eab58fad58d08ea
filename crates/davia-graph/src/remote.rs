//! LangGraph API client: streamed runs, thread state, and assistants.

use crate::engine::{
    ChunkStream, EngineError, EngineResult, ExecutionEngine, MessageChunk, MessageContent,
    RunRequest,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:2024";

/// Engine backed by a running LangGraph API server.
pub struct RemoteEngine {
    client: Client,
    base_url: String,
}

impl RemoteEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_base(base_url.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct RunBody<'a> {
    assistant_id: &'a str,
    input: &'a Value,
    stream_mode: [&'static str; 1],
}

#[async_trait::async_trait]
impl ExecutionEngine for RemoteEngine {
    fn name(&self) -> &str {
        "langgraph"
    }

    async fn stream_run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> EngineResult<ChunkStream> {
        let url = match &request.thread_id {
            Some(thread) => format!("{}/threads/{}/runs/stream", self.base_url, thread),
            None => format!("{}/runs/stream", self.base_url),
        };
        let body = RunBody {
            assistant_id: &request.graph_id,
            input: &request.input,
            stream_mode: ["messages-tuple"],
        };

        debug!("Starting run: graph={} url={}", request.graph_id, url);

        let send = self.client.post(&url).json(&body).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            response = send => check_status(response?).await?,
        };

        Ok(Box::pin(parse_sse_stream(response.bytes_stream(), cancel)))
    }

    async fn thread_state(&self, thread_id: &str) -> EngineResult<Value> {
        let url = format!("{}/threads/{}/state", self.base_url, thread_id);
        let response = check_status(self.client.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> EngineResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!("Engine error {}: {}", status, body);
    Err(EngineError::Status {
        status: status.as_u16(),
        body,
    })
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Parse a `messages-tuple` SSE body into AI message chunks.
///
/// Each `messages` event carries `[message, metadata]`; only AI chunks are
/// forwarded. An `error` event ends the stream with one error item. Events
/// are buffered as raw bytes and decoded whole, so a character split
/// across two reads arrives intact.
pub(crate) fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = EngineResult<MessageChunk>> + Send {
    async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();

        tokio::pin!(bytes_stream);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = bytes_stream.next() => Some(next),
            };
            let Some(next) = next else {
                debug!("Run cancelled, closing engine stream");
                yield Err(EngineError::Cancelled);
                return;
            };
            let chunk = match next {
                Some(Ok(c)) => c,
                Some(Err(e)) => {
                    yield Err(EngineError::StreamError(e.to_string()));
                    return;
                }
                None => {
                    // last event without a trailing blank line
                    match sse_event(&std::mem::take(&mut buffer)) {
                        SseEvent::Chunk(chunk) => yield Ok(chunk),
                        SseEvent::Failed(message) => yield Err(EngineError::StreamError(message)),
                        SseEvent::End | SseEvent::Skip => {}
                    }
                    return;
                }
            };

            buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

            while let Some(event_end) = find_event_end(&buffer) {
                let event: Vec<u8> = buffer.drain(..event_end + 2).collect();
                match sse_event(&event[..event_end]) {
                    SseEvent::Chunk(chunk) => yield Ok(chunk),
                    SseEvent::Failed(message) => {
                        yield Err(EngineError::StreamError(message));
                        return;
                    }
                    SseEvent::End => return,
                    SseEvent::Skip => {}
                }
            }
        }
    }
}

enum SseEvent {
    Chunk(MessageChunk),
    Failed(String),
    End,
    Skip,
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn sse_event(raw: &[u8]) -> SseEvent {
    let (event_type, event_data) = split_event(&String::from_utf8_lossy(raw));
    if event_data.is_empty() {
        return SseEvent::Skip;
    }
    match event_type.as_str() {
        "messages" => ai_chunk(&event_data).map_or(SseEvent::Skip, SseEvent::Chunk),
        "error" => SseEvent::Failed(error_message(&event_data)),
        "end" => SseEvent::End,
        _ => SseEvent::Skip,
    }
}

fn split_event(event: &str) -> (String, String) {
    let mut event_type = String::new();
    let mut data_lines = Vec::new();
    for line in event.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event_type = rest.trim_start().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    (event_type, data_lines.join("\n"))
}

#[derive(Deserialize)]
struct StreamedMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    content: Option<MessageContent>,
}

fn ai_chunk(data: &str) -> Option<MessageChunk> {
    let tuple: Vec<Value> = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!("Skipping malformed messages event: {}", e);
            return None;
        }
    };
    let message: StreamedMessage = serde_json::from_value(tuple.into_iter().next()?).ok()?;
    if !matches!(message.message_type.as_str(), "AIMessageChunk" | "ai") {
        return None;
    }
    Some(MessageChunk {
        content: message.content?,
    })
}

fn error_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(v) => v
            .get("message")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        Err(_) => data.to_string(),
    }
}

/// Timeout and retry for the assistants endpoints.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry)
    }

    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let delay = self.delay(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Assistant {
    pub assistant_id: String,
    pub graph_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Keep the most recently updated assistant for each wanted graph id.
pub fn latest_per_graph<'a>(
    assistants: impl IntoIterator<Item = Assistant>,
    wanted: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, Assistant> {
    let wanted: Vec<&str> = wanted.into_iter().collect();
    let mut latest: HashMap<String, Assistant> = HashMap::new();
    for assistant in assistants {
        if !wanted.contains(&assistant.graph_id.as_str()) {
            continue;
        }
        match latest.get(&assistant.graph_id) {
            Some(current) if current.updated_at >= assistant.updated_at => {}
            _ => {
                latest.insert(assistant.graph_id.clone(), assistant);
            }
        }
    }
    latest
}

pub struct AssistantsClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl AssistantsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_policy(base_url, RetryPolicy::default())
    }

    pub fn with_policy(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_base(base_url.into()),
            policy,
        }
    }

    pub async fn search(&self) -> EngineResult<Vec<Assistant>> {
        let url = format!("{}/assistants/search", self.base_url);
        self.policy
            .run("assistant search", || {
                let request = self
                    .client
                    .post(&url)
                    .timeout(self.policy.timeout)
                    .json(&serde_json::json!({}));
                async move {
                    let response = request.send().await?;
                    Ok(check_status(response).await?.json().await?)
                }
            })
            .await
    }

    pub async fn schemas(&self, assistant_id: &str) -> EngineResult<Value> {
        let url = format!("{}/assistants/{}/schemas", self.base_url, assistant_id);
        self.policy
            .run("assistant schemas", || {
                let request = self.client.get(&url).timeout(self.policy.timeout);
                async move {
                    let response = request.send().await?;
                    Ok(check_status(response).await?.json().await?)
                }
            })
            .await
    }

    /// The `state_schema` member of an assistant's schemas.
    pub async fn state_schema(&self, assistant_id: &str) -> EngineResult<Value> {
        let mut schemas = self.schemas(assistant_id).await?;
        schemas
            .get_mut("state_schema")
            .map(Value::take)
            .ok_or_else(|| EngineError::InvalidResponse("schemas without state_schema".into()))
    }

    /// Remote state schema for each graph id that has an assistant.
    pub async fn state_schemas<'a>(
        &self,
        graph_ids: impl IntoIterator<Item = &'a str>,
    ) -> EngineResult<HashMap<String, Value>> {
        let latest = latest_per_graph(self.search().await?, graph_ids);
        let mut out = HashMap::new();
        for (graph_id, assistant) in latest {
            match self.state_schema(&assistant.assistant_id).await {
                Ok(schema) => {
                    out.insert(graph_id, schema);
                }
                Err(e) => warn!("No remote schema for graph {}: {}", graph_id, e),
            }
        }
        Ok(out)
    }
}
