//! Stream events delivered by a transport during one exchange.
//!
//! A transport converts whatever it receives (SSE frames, WebSocket
//! messages, chunked HTTP) into this vocabulary and hands the events to the
//! controller one at a time, in the order they were produced.

use serde::{Deserialize, Serialize};

/// Events emitted by the remote reasoning service for a single exchange.
///
/// Wire names:
/// - `text_delta`      - fragment of assistant text
/// - `reasoning_delta` - fragment of reasoning trace
/// - `tool_call_start` - the service is invoking a tool
/// - `tool_result`     - the result for an earlier tool call
/// - `done`            - the exchange finished normally
/// - `error`           - the service reported a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial assistant text.
    TextDelta { text: String },

    /// Partial reasoning text.
    ReasoningDelta { text: String },

    /// The service started a tool call.
    ToolCallStart {
        call_id: String,
        tool_name: String,
        #[serde(default)]
        args: serde_json::Value,
    },

    /// The result of a tool call, matched by `call_id`.
    ToolResult {
        call_id: String,
        #[serde(default)]
        result: serde_json::Value,
    },

    /// The exchange is complete.
    Done {},

    /// The service reported an error mid-stream.
    Error { message: String },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::ReasoningDelta { text: text.into() }
    }

    pub fn tool_call(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self::ToolCallStart {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            result,
        }
    }

    pub fn done() -> Self {
        Self::Done {}
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ReasoningDelta { .. } => "reasoning_delta",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// `done` and `error` end an exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
