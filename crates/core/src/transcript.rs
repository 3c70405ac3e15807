//! Transcript model: the observable state built from one exchange.
//!
//! Values here are never mutated after publication. The reducer in the
//! assistant crate clones the previous state and returns a new one, so a
//! reader holding a snapshot never sees a half-applied event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle of the current exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    #[default]
    Idle,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed, errored and cancelled exchanges accept no more events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

impl std::fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One displayable unit of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// A run of consecutive text deltas.
    Text { content: String },

    /// A run of consecutive reasoning deltas.
    Reasoning { content: String },

    /// A single tool invocation. Its result lives in the tool-call registry.
    ToolCall {
        call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
}

impl Step {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn reasoning(content: impl Into<String>) -> Self {
        Self::Reasoning {
            content: content.into(),
        }
    }

    pub fn tool_call(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self::ToolCall {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// A tool call seen in the current exchange, with its result once known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Identity of the exchange a transcript belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeInfo {
    /// Unique per exchange.
    pub id: Uuid,

    /// Conversation the exchange was sent to.
    pub target_id: String,

    pub started_at: DateTime<Utc>,
}

impl ExchangeInfo {
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_id: target_id.into(),
            started_at: Utc::now(),
        }
    }
}

/// The aggregator's full observable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptState {
    pub status: ExchangeStatus,

    /// Arrival-ordered, append-only while streaming.
    pub steps: Vec<Step>,

    /// Every text delta of the exchange, concatenated.
    pub cumulative_text: String,

    /// Every reasoning delta of the exchange, concatenated.
    pub cumulative_reasoning: String,

    /// Keyed by call id.
    pub tool_calls: HashMap<String, ToolCallRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Absent while idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<ExchangeInfo>,
}

impl TranscriptState {
    /// The initial value restored by `reset()`.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A clean streaming state for a newly started exchange.
    pub fn streaming(exchange: ExchangeInfo) -> Self {
        Self {
            status: ExchangeStatus::Streaming,
            exchange: Some(exchange),
            ..Self::default()
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status == ExchangeStatus::Streaming
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn tool_call(&self, call_id: &str) -> Option<&ToolCallRecord> {
        self.tool_calls.get(call_id)
    }

    /// Tool calls still waiting for a result, in step order.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCallRecord> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::ToolCall { call_id, .. } => self.tool_calls.get(call_id),
                _ => None,
            })
            .filter(|record| record.result.is_none())
            .collect()
    }

    /// Conversation id of the exchange, if one has been started.
    pub fn target_id(&self) -> Option<&str> {
        self.exchange.as_ref().map(|e| e.target_id.as_str())
    }
}
