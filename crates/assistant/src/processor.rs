//! Event processor: the pure reducer behind the transcript.
//!
//! `apply` takes the current state and one event and returns the next
//! state. It never mutates its input and never does I/O; the controller
//! publishes whatever it returns.
//!
//! Rules:
//! - consecutive text deltas merge into one text step, reasoning likewise
//! - every delta is appended to its cumulative field regardless of steps
//! - a tool call is always its own step and ends the current run
//! - a tool result updates the matching record and adds no step
//! - once the state is terminal, nothing changes it

use ledgerlens_core::stream::StreamEvent;
use ledgerlens_core::transcript::{ExchangeStatus, Step, ToolCallRecord, TranscriptState};

/// What `apply` did with an event, for the caller to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,

    /// A tool result for a call id that was never started. Dropped.
    UnmatchedToolResult { call_id: String },

    /// A tool call reused an id already in the registry. The record was
    /// replaced and a new step appended.
    DuplicateToolCall { call_id: String },

    /// The state was already terminal. Dropped.
    AfterTerminal,
}

/// Produce the state that follows `event`.
pub fn apply(state: &TranscriptState, event: &StreamEvent) -> TranscriptState {
    apply_with_outcome(state, event).0
}

/// Like [`apply`], also reporting what happened to the event.
pub fn apply_with_outcome(
    state: &TranscriptState,
    event: &StreamEvent,
) -> (TranscriptState, ApplyOutcome) {
    if state.is_terminal() {
        return (state.clone(), ApplyOutcome::AfterTerminal);
    }

    let mut next = state.clone();
    let outcome = match event {
        StreamEvent::TextDelta { text } => {
            push_delta(&mut next.steps, text, DeltaKind::Text);
            next.cumulative_text.push_str(text);
            ApplyOutcome::Applied
        }
        StreamEvent::ReasoningDelta { text } => {
            push_delta(&mut next.steps, text, DeltaKind::Reasoning);
            next.cumulative_reasoning.push_str(text);
            ApplyOutcome::Applied
        }
        StreamEvent::ToolCallStart {
            call_id,
            tool_name,
            args,
        } => {
            next.steps
                .push(Step::tool_call(call_id.as_str(), tool_name.as_str(), args.clone()));
            let previous = next.tool_calls.insert(
                call_id.clone(),
                ToolCallRecord {
                    call_id: call_id.clone(),
                    tool_name: tool_name.clone(),
                    args: args.clone(),
                    result: None,
                },
            );
            match previous {
                Some(_) => ApplyOutcome::DuplicateToolCall {
                    call_id: call_id.clone(),
                },
                None => ApplyOutcome::Applied,
            }
        }
        StreamEvent::ToolResult { call_id, result } => match next.tool_calls.get_mut(call_id) {
            Some(record) => {
                record.result = Some(result.clone());
                ApplyOutcome::Applied
            }
            None => {
                return (
                    state.clone(),
                    ApplyOutcome::UnmatchedToolResult {
                        call_id: call_id.clone(),
                    },
                );
            }
        },
        StreamEvent::Done {} => {
            next.status = ExchangeStatus::Completed;
            ApplyOutcome::Applied
        }
        StreamEvent::Error { message } => {
            next.status = ExchangeStatus::Errored;
            next.error_message = Some(message.clone());
            ApplyOutcome::Applied
        }
    };

    (next, outcome)
}

#[derive(Clone, Copy)]
enum DeltaKind {
    Text,
    Reasoning,
}

/// Extend the open run of the same kind, or start a new one.
/// An empty delta still opens a run when none of its kind is open.
fn push_delta(steps: &mut Vec<Step>, text: &str, kind: DeltaKind) {
    match (kind, steps.last_mut()) {
        (DeltaKind::Text, Some(Step::Text { content }))
        | (DeltaKind::Reasoning, Some(Step::Reasoning { content })) => content.push_str(text),
        (DeltaKind::Text, _) => steps.push(Step::text(text)),
        (DeltaKind::Reasoning, _) => steps.push(Step::reasoning(text)),
    }
}
