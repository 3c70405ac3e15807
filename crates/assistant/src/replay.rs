//! Replay transport: plays back a recorded event stream.
//!
//! Recordings are JSON lines, one [`StreamEvent`] per line:
//!
//! ```text
//! # balance question, 2 tool calls
//! {"type":"reasoning_delta","text":"The user wants their balance."}
//! {"type":"tool_call_start","call_id":"c1","tool_name":"get_accounts","args":{}}
//! {"type":"tool_result","call_id":"c1","result":{"checking":1250.5}}
//! {"type":"text_delta","text":"You have $1,250.50 in checking."}
//! {"type":"done"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use async_trait::async_trait;
use ledgerlens_core::error::{Error, Result, TransportError};
use ledgerlens_core::stream::StreamEvent;
use ledgerlens_core::transport::{CancelToken, EventSink, ExchangeRequest, TransportAdapter};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// A transport that emits a fixed script for every exchange.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    script: Vec<StreamEvent>,
    delay: Duration,
    failure: Option<TransportError>,
}

impl ReplayTransport {
    pub fn new(script: Vec<StreamEvent>) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            failure: None,
        }
    }

    /// Parse a JSON-lines recording.
    pub fn from_jsonl(input: &str) -> Result<Self> {
        let mut script = Vec::new();
        for (index, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let event = serde_json::from_str(line).map_err(|e| Error::Recording {
                line: index + 1,
                reason: e.to_string(),
            })?;
            script.push(event);
        }
        Ok(Self::new(script))
    }

    /// Load a JSON-lines recording from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_jsonl(&content)
    }

    /// Pause between events.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail with `error` after the script has been played.
    pub fn failing_with(mut self, error: TransportError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn events(&self) -> &[StreamEvent] {
        &self.script
    }
}

#[async_trait]
impl TransportAdapter for ReplayTransport {
    fn name(&self) -> &str {
        "replay"
    }

    async fn start_exchange(
        &self,
        request: ExchangeRequest,
        cancel: CancelToken,
        sink: EventSink,
    ) -> std::result::Result<(), TransportError> {
        debug!(
            generation = %cancel.generation(),
            target = %request.target_id,
            events = self.script.len(),
            "Replaying recording"
        );

        for event in &self.script {
            if self.delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }
            sink.emit(event.clone());
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
