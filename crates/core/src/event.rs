//! Domain event system: lets observers follow exchanges without touching
//! the transcript.
//!
//! The controller publishes an event whenever an exchange starts, ends, is
//! superseded, or drops something. Subscribers filter for what they care
//! about.

use crate::transcript::ExchangeStatus;
use crate::transport::Generation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new exchange was handed to the transport
    ExchangeStarted {
        generation: Generation,
        target_id: String,
        transport: String,
        timestamp: DateTime<Utc>,
    },

    /// An in-flight exchange was cancelled because a new one started
    ExchangeSuperseded {
        superseded: Generation,
        timestamp: DateTime<Utc>,
    },

    /// An exchange reached a terminal status
    ExchangeFinished {
        generation: Generation,
        target_id: String,
        status: ExchangeStatus,
        steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// An event or settlement arrived for an exchange that is no longer current
    StaleEventDiscarded {
        generation: Generation,
        event_type: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool result named a call id that was never started
    UnmatchedToolResult {
        generation: Generation,
        call_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
