//! Transport adapter trait: the boundary to the remote reasoning service.
//!
//! A transport opens one exchange, delivers its events in order through an
//! [`EventSink`], watches a [`CancelToken`], and returns when the exchange
//! ends. How the bytes move (SSE, WebSocket, chunked HTTP) is the
//! transport's business alone.

use crate::error::TransportError;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Monotonically increasing exchange number minted by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cancellation handle for one exchange.
///
/// Cancellation is cooperative: a transport may keep emitting for a while
/// after the token fires. The controller drops anything tagged with a
/// generation that is no longer current, so correctness never depends on
/// how quickly a transport reacts.
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: Generation,
    signal: CancellationToken,
}

impl CancelToken {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            signal: CancellationToken::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Signal the transport to stop. Idempotent.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.signal.cancelled().await;
    }
}

/// Extended reasoning settings forwarded to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Provider-specific effort hint (e.g. "low", "medium", "high").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,

    /// Token budget for the reasoning trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

/// Resolved per-exchange options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOptions {
    /// Provider name (e.g. "openai", "anthropic").
    pub provider: String,

    /// Model identifier.
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,

    /// Passed through to the transport untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Everything a transport needs to open one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// Conversation the message belongs to.
    pub target_id: String,

    /// The user's message.
    pub content: String,

    pub options: ExchangeOptions,
}

/// Callback a transport uses to hand events to the controller.
#[derive(Clone)]
pub struct EventSink {
    inner: Arc<dyn Fn(StreamEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new(f: impl Fn(StreamEvent) + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    pub fn emit(&self, event: StreamEvent) {
        (self.inner)(event);
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// The transport trait.
///
/// Implementations must deliver events for one exchange strictly in the
/// order they were produced and one at a time. `Ok(())` means the exchange
/// ended on its own; `Err(TransportError::Cancelled)` means it stopped
/// because `cancel` fired; any other error is a transport failure.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// A human-readable name for this transport (e.g. "sse", "replay").
    fn name(&self) -> &str;

    async fn start_exchange(
        &self,
        request: ExchangeRequest,
        cancel: CancelToken,
        sink: EventSink,
    ) -> std::result::Result<(), TransportError>;
}
