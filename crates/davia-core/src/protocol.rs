//! Chat stream wire protocol (AI data stream, version 1)
//!
//! Wire format, one line per chunk:
//!
//!   <tag>:<JSON-encoded payload>\n
//!
//! Server → Client:
//!   0:"Hello"        text delta
//!   3:"engine down"  error, terminates the stream
//!
//! The response carrying these lines is marked with the
//! `x-vercel-ai-data-stream: v1` header.

use serde::Serialize;

/// Header announcing the wire protocol version.
pub const STREAM_PROTOCOL_HEADER: &str = "x-vercel-ai-data-stream";
pub const STREAM_PROTOCOL_VERSION: &str = "v1";

/// Line tags. Only text and error are produced today.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireTag {
    Text,
    Error,
}

impl WireTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "0",
            Self::Error => "3",
        }
    }
}

/// One emitted protocol line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireChunk {
    pub tag: WireTag,
    pub payload: String,
}

impl WireChunk {
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            tag: WireTag::Text,
            payload: payload.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            tag: WireTag::Error,
            payload: message.into(),
        }
    }

    /// Encode as a complete line, trailing newline included.
    pub fn encode(&self) -> String {
        format!("{}:{}\n", self.tag.as_str(), encode_payload(&self.payload))
    }
}

fn encode_payload(payload: &impl Serialize) -> String {
    // Serializing a string cannot fail.
    serde_json::to_string(payload).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_line_is_json_string() {
        assert_eq!(WireChunk::text("Hello").encode(), "0:\"Hello\"\n");
    }

    #[test]
    fn payload_is_escaped() {
        let line = WireChunk::text("say \"hi\"\nbye").encode();
        assert_eq!(line, "0:\"say \\\"hi\\\"\\nbye\"\n");
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn error_tag() {
        assert_eq!(WireChunk::error("boom").encode(), "3:\"boom\"\n");
    }
}
