//! Shared test helpers for controller tests.

use async_trait::async_trait;
use ledgerlens_core::cache::TranscriptCache;
use ledgerlens_core::error::TransportError;
use ledgerlens_core::transport::{CancelToken, EventSink, ExchangeRequest, TransportAdapter};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// One exchange opened against a [`ManualTransport`].
pub struct ManualExchange {
    pub request: ExchangeRequest,
    pub token: CancelToken,
    pub sink: EventSink,
    finish: Mutex<Option<oneshot::Sender<Result<(), TransportError>>>>,
}

impl ManualExchange {
    /// Let the transport call return `result`.
    pub fn finish(&self, result: Result<(), TransportError>) {
        if let Some(tx) = self.finish.lock().unwrap().take() {
            let _ = tx.send(result);
        }
    }
}

/// A transport driven by the test: events are emitted by hand through the
/// captured sink, and the call only returns when `finish` is called.
/// It ignores its cancel token, like a slow real transport would.
#[derive(Default)]
pub struct ManualTransport {
    exchanges: Mutex<Vec<Arc<ManualExchange>>>,
}

impl ManualTransport {
    pub fn started(&self) -> usize {
        self.exchanges.lock().unwrap().len()
    }

    /// Wait until exchange number `index` (0-based) has been opened.
    pub async fn exchange(&self, index: usize) -> Arc<ManualExchange> {
        loop {
            if let Some(exchange) = self.exchanges.lock().unwrap().get(index) {
                return Arc::clone(exchange);
            }
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl TransportAdapter for ManualTransport {
    fn name(&self) -> &str {
        "manual"
    }

    async fn start_exchange(
        &self,
        request: ExchangeRequest,
        cancel: CancelToken,
        sink: EventSink,
    ) -> Result<(), TransportError> {
        let (tx, rx) = oneshot::channel();
        self.exchanges
            .lock()
            .unwrap()
            .push(Arc::new(ManualExchange {
                request,
                token: cancel,
                sink,
                finish: Mutex::new(Some(tx)),
            }));

        rx.await
            .unwrap_or_else(|_| Err(TransportError::ConnectionLost("test dropped".into())))
    }
}

/// Records every invalidated conversation id.
#[derive(Default)]
pub struct RecordingCache {
    invalidated: Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }
}

impl TranscriptCache for RecordingCache {
    fn invalidate(&self, conversation_id: &str) {
        self.invalidated
            .lock()
            .unwrap()
            .push(conversation_id.to_string());
    }
}
