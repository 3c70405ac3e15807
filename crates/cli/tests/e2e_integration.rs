//! End-to-end integration tests for the LedgerLens assistant transcript.
//!
//! These tests drive the exchange controller through a transport the test
//! feeds by hand, covering the full path from `send` to the published
//! transcript, including cancellation, supersession, and failures.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ledgerlens_assistant::{ExchangeController, ReplayTransport, SendOptions};
use ledgerlens_config::AppConfig;
use ledgerlens_core::cache::TranscriptCache;
use ledgerlens_core::error::TransportError;
use ledgerlens_core::event::DomainEvent;
use ledgerlens_core::stream::StreamEvent;
use ledgerlens_core::transcript::{ExchangeStatus, Step, TranscriptState};
use ledgerlens_core::transport::{CancelToken, EventSink, ExchangeRequest, TransportAdapter};
use serde_json::json;
use tokio::sync::mpsc;

// ── Piped Transport ─────────────────────────────────────────────────────

enum Cmd {
    Event(StreamEvent),
    Finish(Result<(), TransportError>),
}

/// A transport whose exchanges are fed through channels held by the test.
///
/// Exchange N reads from pipe N. It ignores its cancel token, so events sent
/// after a cancel still reach the controller, as with a slow real transport.
struct PipedTransport {
    pipes: Mutex<VecDeque<mpsc::UnboundedReceiver<Cmd>>>,
    requests: Mutex<Vec<ExchangeRequest>>,
}

impl PipedTransport {
    fn new(exchanges: usize) -> (Arc<Self>, Vec<Pipe>) {
        let mut receivers = VecDeque::new();
        let mut pipes = Vec::new();
        for _ in 0..exchanges {
            let (tx, rx) = mpsc::unbounded_channel();
            receivers.push_back(rx);
            pipes.push(Pipe(tx));
        }
        let transport = Arc::new(Self {
            pipes: Mutex::new(receivers),
            requests: Mutex::new(Vec::new()),
        });
        (transport, pipes)
    }

    fn requests(&self) -> Vec<ExchangeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TransportAdapter for PipedTransport {
    fn name(&self) -> &str {
        "piped"
    }

    async fn start_exchange(
        &self,
        request: ExchangeRequest,
        _cancel: CancelToken,
        sink: EventSink,
    ) -> Result<(), TransportError> {
        self.requests.lock().unwrap().push(request);
        let next = self.pipes.lock().unwrap().pop_front();
        let Some(mut rx) = next else {
            return Err(TransportError::ConnectionLost("no pipe left".into()));
        };

        while let Some(cmd) = rx.recv().await {
            match cmd {
                Cmd::Event(event) => sink.emit(event),
                Cmd::Finish(result) => return result,
            }
        }
        Ok(())
    }
}

struct Pipe(mpsc::UnboundedSender<Cmd>);

impl Pipe {
    fn emit(&self, event: StreamEvent) {
        let _ = self.0.send(Cmd::Event(event));
    }

    fn finish(&self, result: Result<(), TransportError>) {
        let _ = self.0.send(Cmd::Finish(result));
    }
}

/// Records every invalidated conversation id.
#[derive(Default)]
struct RecordingCache(Mutex<Vec<String>>);

impl TranscriptCache for RecordingCache {
    fn invalidate(&self, conversation_id: &str) {
        self.0.lock().unwrap().push(conversation_id.to_string());
    }
}

fn controller(transport: Arc<PipedTransport>) -> ExchangeController {
    ExchangeController::new(transport).with_default_target(Some("thread-1".into()))
}

/// Wait until the published transcript satisfies `pred`.
async fn wait_for(
    controller: &ExchangeController,
    pred: impl Fn(&TranscriptState) -> bool,
) -> Arc<TranscriptState> {
    let mut rx = controller.subscribe();
    let wait = async {
        loop {
            let state = rx.borrow_and_update().clone();
            if pred(&state) {
                return state;
            }
            if rx.changed().await.is_err() {
                return state;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("transcript never reached the expected state")
}

// ── E2E: Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_happy_path() {
    let (transport, pipes) = PipedTransport::new(1);
    let cache = Arc::new(RecordingCache::default());
    let controller = controller(transport.clone()).with_cache(cache.clone());

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::text("Hello"));
    pipes[0].emit(StreamEvent::text(" there"));
    pipes[0].emit(StreamEvent::done());
    pipes[0].finish(Ok(()));
    handle.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Completed);
    assert_eq!(state.steps, vec![Step::text("Hello there")]);
    assert_eq!(state.cumulative_text, "Hello there");
    assert_eq!(*cache.0.lock().unwrap(), vec!["thread-1".to_string()]);
    assert_eq!(transport.requests()[0].content, "Hi");
}

#[tokio::test]
async fn e2e_tool_round_trip() {
    let (transport, pipes) = PipedTransport::new(1);
    let controller = controller(transport);

    let handle = controller.send("What's my balance?", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::tool_call("c1", "lookup", json!({"q": "x"})));
    pipes[0].emit(StreamEvent::tool_result("c1", json!({"v": 42})));
    pipes[0].emit(StreamEvent::text("done"));
    pipes[0].emit(StreamEvent::done());
    pipes[0].finish(Ok(()));
    handle.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Completed);
    assert_eq!(
        state.steps,
        vec![
            Step::tool_call("c1", "lookup", json!({"q": "x"})),
            Step::text("done"),
        ]
    );
    assert_eq!(state.tool_calls["c1"].result, Some(json!({"v": 42})));
}

#[tokio::test]
async fn e2e_cancellation_mid_stream() {
    let (transport, pipes) = PipedTransport::new(1);
    let controller = controller(transport);

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    controller.cancel();

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Cancelled);
    assert!(state.steps.is_empty());

    pipes[0].emit(StreamEvent::text("ignored"));
    pipes[0].emit(StreamEvent::done());
    pipes[0].finish(Err(TransportError::Cancelled));
    handle.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Cancelled);
    assert!(state.steps.is_empty());
    assert!(state.error_message.is_none());
}

#[tokio::test]
async fn e2e_error_event_keeps_partial_transcript() {
    let (transport, pipes) = PipedTransport::new(1);
    let cache = Arc::new(RecordingCache::default());
    let controller = controller(transport).with_cache(cache.clone());

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::text("partial"));
    pipes[0].emit(StreamEvent::error("rate limited"));
    pipes[0].finish(Err(TransportError::Http {
        status_code: 429,
        message: "Too many requests".into(),
    }));
    handle.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Errored);
    assert_eq!(state.error_message.as_deref(), Some("rate limited"));
    assert_eq!(state.steps, vec![Step::text("partial")]);
    assert!(cache.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn e2e_transport_failure_surfaces_fallback() {
    let (transport, pipes) = PipedTransport::new(1);
    let controller = controller(transport);

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::reasoning("thinking"));
    pipes[0].finish(Err(TransportError::ConnectionLost("connection reset".into())));
    handle.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Errored);
    let message = state.error_message.as_deref().unwrap();
    assert!(!message.is_empty());
    assert!(!message.contains("connection reset"));
    assert_eq!(state.cumulative_reasoning, "thinking");
}

#[tokio::test]
async fn e2e_stale_events_cannot_corrupt_new_exchange() {
    let (transport, pipes) = PipedTransport::new(2);
    let controller = controller(transport);

    let first = controller.send("first", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::text("A1"));
    wait_for(&controller, |s| s.cumulative_text == "A1").await;

    let second = controller.send("second", SendOptions::default()).unwrap();
    assert!(second.generation() > first.generation());

    // A keeps talking after being superseded
    pipes[0].emit(StreamEvent::text("A2"));
    pipes[0].emit(StreamEvent::tool_call("a", "lookup", json!({})));
    pipes[0].emit(StreamEvent::done());
    pipes[0].finish(Err(TransportError::ConnectionLost("late".into())));
    first.settled().await;

    pipes[1].emit(StreamEvent::text("B1"));
    let state = wait_for(&controller, |s| s.cumulative_text == "B1").await;
    assert_eq!(state.status, ExchangeStatus::Streaming);
    assert_eq!(state.steps, vec![Step::text("B1")]);
    assert!(state.tool_calls.is_empty());

    pipes[1].emit(StreamEvent::done());
    pipes[1].finish(Ok(()));
    second.settled().await;
    assert_eq!(controller.snapshot().status, ExchangeStatus::Completed);
    assert_eq!(controller.snapshot().cumulative_text, "B1");
}

#[tokio::test]
async fn e2e_reset_is_idempotent_and_discards_in_flight_events() {
    let (transport, pipes) = PipedTransport::new(1);
    let controller = controller(transport);

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::text("partial"));
    wait_for(&controller, |s| !s.steps.is_empty()).await;

    controller.reset();
    let once = controller.snapshot();
    controller.reset();
    assert_eq!(controller.snapshot(), once);
    assert_eq!(*once, TranscriptState::idle());

    pipes[0].emit(StreamEvent::text("late"));
    pipes[0].finish(Ok(()));
    handle.settled().await;
    assert_eq!(*controller.snapshot(), TranscriptState::idle());
}

#[tokio::test]
async fn e2e_unmatched_tool_result_is_dropped() {
    let (transport, pipes) = PipedTransport::new(1);
    let controller = controller(transport);
    let mut events = controller.event_bus().subscribe();

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::text("before"));
    pipes[0].emit(StreamEvent::tool_result("unknown", json!(1)));
    pipes[0].emit(StreamEvent::done());
    pipes[0].finish(Ok(()));
    handle.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Completed);
    assert_eq!(state.steps, vec![Step::text("before")]);
    assert!(state.tool_calls.is_empty());

    let mut unmatched = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::UnmatchedToolResult { call_id, .. } = event.as_ref() {
            unmatched.push(call_id.clone());
        }
    }
    assert_eq!(unmatched, vec!["unknown".to_string()]);
}

#[tokio::test]
async fn e2e_events_after_done_are_ignored() {
    let (transport, pipes) = PipedTransport::new(1);
    let controller = controller(transport);

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::text("final"));
    pipes[0].emit(StreamEvent::done());
    pipes[0].emit(StreamEvent::text(" extra"));
    pipes[0].emit(StreamEvent::error("late error"));
    pipes[0].finish(Ok(()));
    handle.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Completed);
    assert_eq!(state.cumulative_text, "final");
    assert!(state.error_message.is_none());
}

#[tokio::test]
async fn e2e_subscribers_see_incremental_snapshots() {
    let (transport, pipes) = PipedTransport::new(1);
    let controller = controller(transport);

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].emit(StreamEvent::reasoning("Looking up"));
    let first = wait_for(&controller, |s| !s.cumulative_reasoning.is_empty()).await;

    pipes[0].emit(StreamEvent::text("Here"));
    pipes[0].emit(StreamEvent::done());
    pipes[0].finish(Ok(()));
    handle.settled().await;

    // The earlier snapshot was not touched by later events
    assert_eq!(first.steps, vec![Step::reasoning("Looking up")]);
    assert!(first.cumulative_text.is_empty());
    assert_eq!(
        controller.snapshot().steps,
        vec![Step::reasoning("Looking up"), Step::text("Here")]
    );
}

// ── E2E: Configuration and Replay ──────────────────────────────────────

#[tokio::test]
async fn e2e_config_supplies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[assistant]
default_provider = "anthropic"
default_model = "claude-sonnet-4"
default_conversation = "thread-42"
transport_failure_message = "Assistant unavailable"

[assistant.reasoning]
enabled = true
budget_tokens = 1024
"#,
    )
    .unwrap();
    let config = AppConfig::load_from(&path).unwrap();

    let (transport, pipes) = PipedTransport::new(1);
    let controller = ExchangeController::from_config(&config, transport.clone());

    let handle = controller.send("Hi", SendOptions::default()).unwrap();
    pipes[0].finish(Err(TransportError::Timeout("60s".into())));
    handle.settled().await;

    let request = &transport.requests()[0];
    assert_eq!(request.target_id, "thread-42");
    assert_eq!(request.options.provider, "anthropic");
    assert_eq!(request.options.model, "claude-sonnet-4");
    assert_eq!(
        request.options.reasoning.as_ref().and_then(|r| r.budget_tokens),
        Some(1024)
    );
    assert_eq!(
        controller.snapshot().error_message.as_deref(),
        Some("Assistant unavailable")
    );
}

#[tokio::test]
async fn e2e_replay_recording_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# portfolio question").unwrap();
    writeln!(file, r#"{{"type":"reasoning_delta","text":"Check holdings. "}}"#).unwrap();
    writeln!(
        file,
        r#"{{"type":"tool_call_start","call_id":"h1","tool_name":"get_holdings","args":{{"account":"brokerage"}}}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"type":"tool_result","call_id":"h1","result":[{{"symbol":"VTI","shares":12}}]}}"#
    )
    .unwrap();
    writeln!(file, r#"{{"type":"text_delta","text":"You hold "}}"#).unwrap();
    writeln!(file, r#"{{"type":"text_delta","text":"12 shares of VTI."}}"#).unwrap();
    writeln!(file, r#"{{"type":"done"}}"#).unwrap();

    let transport = Arc::new(ReplayTransport::from_file(file.path()).unwrap());
    let controller =
        ExchangeController::new(transport).with_default_target(Some("thread-7".into()));

    controller
        .send("What do I hold?", SendOptions::default())
        .unwrap()
        .settled()
        .await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Completed);
    assert_eq!(
        state.steps,
        vec![
            Step::reasoning("Check holdings. "),
            Step::tool_call("h1", "get_holdings", json!({"account": "brokerage"})),
            Step::text("You hold 12 shares of VTI."),
        ]
    );
    assert_eq!(
        state.tool_calls["h1"].result,
        Some(json!([{"symbol": "VTI", "shares": 12}]))
    );
    assert!(state.pending_tool_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn e2e_slow_replay_superseded_by_new_send() {
    let transport = Arc::new(
        ReplayTransport::new(vec![
            StreamEvent::text("one "),
            StreamEvent::text("two "),
            StreamEvent::text("three"),
            StreamEvent::done(),
        ])
        .with_delay(Duration::from_secs(1)),
    );
    let controller =
        ExchangeController::new(transport).with_default_target(Some("thread-1".into()));

    let first = controller.send("first", SendOptions::default()).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(controller.snapshot().cumulative_text, "one ");

    let second = controller.send("second", SendOptions::default()).unwrap();
    first.settled().await;
    second.settled().await;

    let state = controller.snapshot();
    assert_eq!(state.status, ExchangeStatus::Completed);
    assert_eq!(state.cumulative_text, "one two three");
    assert_eq!(state.steps.len(), 1);
}
