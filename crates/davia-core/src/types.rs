//! Core types for Davia

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role as sent by the chat client
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Message type name used inside graph state.
    pub fn graph_type(&self) -> &'static str {
        match self {
            Role::User => "human",
            Role::Assistant => "ai",
        }
    }
}

/// A message in a chat request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Convert into the message object a graph's state carries, with a fresh id.
    pub fn to_graph_message(&self) -> Value {
        serde_json::json!({
            "type": self.role.graph_type(),
            "content": self.content,
            "id": uuid::Uuid::new_v4().to_string(),
        })
    }
}

/// Body of `POST /chat`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Body of `POST /get_state`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetStateRequest {
    pub thread_id: String,
}

/// Body of `POST /create_state_map` and response of `GET /get_state_map`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateMap {
    pub messages_path: String,
}

/// What a registered entry is
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Task,
    Graph,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Graph => write!(f, "graph"),
        }
    }
}

/// Schema of one task or graph as returned by the schema endpoints
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SchemaEntry {
    pub name: String,
    pub docstring: Option<String>,
    pub source_file: Option<String>,
    pub user_state_snapshot: Option<Value>,
    pub kind: EntryKind,
}
