//! Graph input construction from client messages

use davia_core::{ChatMessage, Error, Result};
use serde_json::{Map, Value};

/// Where message history lives in a graph's state when nothing else is recorded.
pub const DEFAULT_MESSAGES_PATH: &str = "messages";

/// Build the input for one run: the newest client message, nested at the
/// dotted `messages_path` (`"conversation.messages"` →
/// `{"conversation": {"messages": [msg]}}`).
pub fn build_graph_input(messages: &[ChatMessage], messages_path: &str) -> Result<Value> {
    let last = messages
        .last()
        .ok_or_else(|| Error::InvalidRequest("messages must not be empty".into()))?;

    let segments = path_segments(messages_path)?;

    let mut value = Value::Array(vec![last.to_graph_message()]);
    for segment in segments.iter().rev() {
        let mut map = Map::new();
        map.insert(segment.to_string(), value);
        value = Value::Object(map);
    }
    Ok(value)
}

/// Check a dotted messages path: at least one segment, none empty.
pub fn validate_messages_path(messages_path: &str) -> Result<()> {
    path_segments(messages_path).map(|_| ())
}

fn path_segments(messages_path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = messages_path.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::InvalidRequest(format!(
            "invalid messages path '{}'",
            messages_path
        )));
    }
    Ok(segments)
}
