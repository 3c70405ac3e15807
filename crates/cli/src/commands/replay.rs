//! `ledgerlens replay` - Play a recording through the transcript aggregator.

use ledgerlens_assistant::{ExchangeController, ReplayTransport, SendOptions};
use ledgerlens_config::AppConfig;
use ledgerlens_core::transcript::{ExchangeStatus, Step, TranscriptState};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn run(
    file: PathBuf,
    conversation: Option<String>,
    delay_ms: u64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let transport = ReplayTransport::from_file(&file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?
        .with_delay(Duration::from_millis(delay_ms));
    let event_count = transport.events().len();

    let target = conversation
        .or_else(|| config.assistant.default_conversation.clone())
        .unwrap_or_else(|| "replay".into());
    let controller = ExchangeController::from_config(&config, Arc::new(transport));
    let mut updates = controller.subscribe();

    info!(events = event_count, file = %file.display(), target = %target, "Replaying recording");

    let handle = controller
        .send(format!("replay:{}", file.display()), SendOptions::to(&target))
        .ok_or("Could not start the exchange")?;

    // Stream text to stdout as it arrives unless JSON output was requested
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if !json {
                if let Some(fresh) = state.cumulative_text.get(printed..) {
                    print!("{fresh}");
                    let _ = std::io::stdout().flush();
                }
                printed = state.cumulative_text.len();
            }
            if state.is_terminal() {
                break;
            }
        }
    });

    tokio::select! {
        _ = handle.settled() => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            warn!(
                generation = %controller.current_generation(),
                "Interrupted, cancelling exchange"
            );
            controller.cancel();
        }
    }
    let _ = printer.await;

    let state = controller.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&*state)?);
    } else {
        println!();
        println!();
        print!("{}", render(&state));
    }

    match state.status {
        ExchangeStatus::Errored => Err(state
            .error_message
            .clone()
            .unwrap_or_else(|| "exchange failed".into())
            .into()),
        _ => Ok(()),
    }
}

/// Human-readable transcript summary.
fn render(state: &TranscriptState) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  Conversation: {}\n",
        state.target_id().unwrap_or("-")
    ));
    out.push_str(&format!("  Status:       {}\n", state.status));
    out.push_str(&format!("  Steps:        {}\n", state.steps.len()));
    out.push('\n');

    for (i, step) in state.steps.iter().enumerate() {
        match step {
            Step::Text { content } => {
                out.push_str(&format!("  {:>2}. text       {}\n", i + 1, one_line(content)));
            }
            Step::Reasoning { content } => {
                out.push_str(&format!("  {:>2}. reasoning  {}\n", i + 1, one_line(content)));
            }
            Step::ToolCall {
                call_id,
                tool_name,
                args,
            } => {
                let result = state
                    .tool_call(call_id)
                    .and_then(|r| r.result.as_ref())
                    .map_or_else(|| "(pending)".to_string(), ToString::to_string);
                out.push_str(&format!(
                    "  {:>2}. tool       {tool_name}({args}) [{call_id}] → {result}\n",
                    i + 1
                ));
            }
        }
    }

    if let Some(message) = &state.error_message {
        out.push('\n');
        out.push_str(&format!("  Error: {message}\n"));
    }
    out
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
