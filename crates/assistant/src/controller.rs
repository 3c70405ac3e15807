//! Exchange controller: owns the single live exchange and its transcript.
//!
//! Every `send` mints a new [`Generation`] and a [`CancelToken`] for it.
//! The event callback handed to the transport closes over that generation
//! and is a no-op once the generation is no longer the active one, so a
//! transport that keeps talking after being cancelled cannot touch a newer
//! exchange's transcript. The same check applies to the transport's final
//! result.
//!
//! The transcript is held as an `Arc<TranscriptState>` and replaced, never
//! edited, on every change. Readers get snapshots through [`snapshot`] or a
//! `watch` subscription.
//!
//! [`snapshot`]: ExchangeController::snapshot

use crate::processor::{ApplyOutcome, apply_with_outcome};
use chrono::Utc;
use ledgerlens_config::AppConfig;
use ledgerlens_core::cache::{NoopCache, TranscriptCache};
use ledgerlens_core::error::TransportError;
use ledgerlens_core::event::{DomainEvent, EventBus};
use ledgerlens_core::stream::StreamEvent;
use ledgerlens_core::transcript::{ExchangeInfo, ExchangeStatus, TranscriptState};
use ledgerlens_core::transport::{
    CancelToken, EventSink, ExchangeOptions, ExchangeRequest, Generation, ReasoningConfig,
    TransportAdapter,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fallback options applied when `send` leaves a field unset.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDefaults {
    pub provider: String,
    pub model: String,
    pub reasoning: Option<ReasoningConfig>,

    /// Surfaced when a transport fails without sending an `error` event.
    pub transport_failure_message: String,
}

impl Default for ExchangeDefaults {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ExchangeDefaults {
    pub fn from_config(config: &AppConfig) -> Self {
        let assistant = &config.assistant;
        Self {
            provider: assistant.default_provider.clone(),
            model: assistant.default_model.clone(),
            reasoning: assistant
                .reasoning
                .enabled
                .then(|| assistant.reasoning.clone()),
            transport_failure_message: assistant.transport_failure_message.clone(),
        }
    }
}

/// Per-call overrides for [`ExchangeController::send`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    /// Conversation to send to. Falls back to the controller's default.
    pub target_id: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub reasoning: Option<ReasoningConfig>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SendOptions {
    pub fn to(target_id: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id.into()),
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningConfig) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn resolve(self, defaults: &ExchangeDefaults) -> ExchangeOptions {
        ExchangeOptions {
            provider: self.provider.unwrap_or_else(|| defaults.provider.clone()),
            model: self.model.unwrap_or_else(|| defaults.model.clone()),
            reasoning: self.reasoning.or_else(|| defaults.reasoning.clone()),
            extra: self.extra,
        }
    }
}

/// Handle to a started exchange's transport task.
#[derive(Debug)]
pub struct ExchangeHandle {
    generation: Generation,
    task: JoinHandle<()>,
}

impl ExchangeHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Wait until the transport has returned and its result was handled.
    pub async fn settled(self) {
        if let Err(e) = self.task.await {
            warn!(generation = %self.generation, "Exchange task ended abnormally: {e}");
        }
    }
}

/// Mutable controller state, always accessed under one lock.
struct Core {
    /// Last generation handed out.
    generation: Generation,

    /// Token of the exchange whose events are still accepted.
    active: Option<CancelToken>,

    default_target: Option<String>,

    state: Arc<TranscriptState>,
}

/// State shared between the controller and its transport callbacks.
#[derive(Clone)]
struct Hub {
    core: Arc<Mutex<Core>>,
    publisher: Arc<watch::Sender<Arc<TranscriptState>>>,
    cache: Arc<dyn TranscriptCache>,
    events: Arc<EventBus>,
    failure_message: Arc<str>,
}

/// A status change that needs announcing once the lock is released.
struct Finished {
    generation: Generation,
    state: Arc<TranscriptState>,
}

impl Hub {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, core: &mut Core, next: TranscriptState) {
        core.state = Arc::new(next);
        self.publisher.send_replace(Arc::clone(&core.state));
    }

    /// Per-event callback body.
    fn on_event(&self, generation: Generation, event: StreamEvent) {
        let finished = {
            let mut core = self.lock();

            if !is_active(&core, generation) || !core.state.is_streaming() {
                debug!(
                    generation = %generation,
                    event = event.event_type(),
                    "Discarding event for inactive exchange"
                );
                self.events.publish(DomainEvent::StaleEventDiscarded {
                    generation,
                    event_type: event.event_type().to_string(),
                    timestamp: Utc::now(),
                });
                return;
            }

            let (next, outcome) = apply_with_outcome(&core.state, &event);
            match outcome {
                ApplyOutcome::Applied => {}
                ApplyOutcome::UnmatchedToolResult { call_id } => {
                    warn!(
                        generation = %generation,
                        call_id = %call_id,
                        "Dropping tool result with no matching call"
                    );
                    self.events.publish(DomainEvent::UnmatchedToolResult {
                        generation,
                        call_id,
                        timestamp: Utc::now(),
                    });
                    return;
                }
                ApplyOutcome::DuplicateToolCall { call_id } => {
                    warn!(
                        generation = %generation,
                        call_id = %call_id,
                        "Tool call id reused, replacing record"
                    );
                }
                ApplyOutcome::AfterTerminal => return,
            }

            let terminal = next.is_terminal();
            self.publish(&mut core, next);
            terminal.then(|| Finished {
                generation,
                state: Arc::clone(&core.state),
            })
        };

        if let Some(finished) = finished {
            self.announce(finished);
        }
    }

    /// Handle the transport's return value.
    fn settle(&self, generation: Generation, result: Result<(), TransportError>) {
        let finished = {
            let mut core = self.lock();

            if !is_active(&core, generation) {
                match &result {
                    Err(e) if !e.is_cancellation() => {
                        debug!(
                            generation = %generation,
                            "Ignoring failure of superseded exchange: {e}"
                        );
                    }
                    _ => debug!(generation = %generation, "Superseded exchange settled"),
                }
                return;
            }
            core.active = None;

            if !core.state.is_streaming() {
                if let Err(e) = &result {
                    debug!(generation = %generation, "Transport failed after exchange ended: {e}");
                }
                return;
            }

            let mut next = (*core.state).clone();
            match result {
                Ok(()) => {
                    warn!(generation = %generation, "Transport ended without a done event");
                    next.status = ExchangeStatus::Completed;
                }
                Err(TransportError::Cancelled) => {
                    debug!(generation = %generation, "Transport reported cancellation");
                    next.status = ExchangeStatus::Cancelled;
                }
                Err(e) => {
                    warn!(generation = %generation, "Transport failed: {e}");
                    next.status = ExchangeStatus::Errored;
                    next.error_message = Some(self.failure_message.to_string());
                }
            }

            self.publish(&mut core, next);
            Finished {
                generation,
                state: Arc::clone(&core.state),
            }
        };

        self.announce(finished);
    }

    /// Drop the active exchange. Returns what to announce if it was streaming.
    fn cancel_locked(&self, core: &mut Core) -> Option<Finished> {
        let token = core.active.take()?;
        token.cancel();

        if !core.state.is_streaming() {
            return None;
        }

        let mut next = (*core.state).clone();
        next.status = ExchangeStatus::Cancelled;
        self.publish(core, next);
        Some(Finished {
            generation: token.generation(),
            state: Arc::clone(&core.state),
        })
    }

    /// Log, notify collaborators, and publish the domain event.
    fn announce(&self, finished: Finished) {
        let Finished { generation, state } = finished;
        let target_id = state.target_id().unwrap_or_default().to_string();

        info!(
            generation = %generation,
            target = %target_id,
            status = %state.status,
            steps = state.steps.len(),
            "Exchange finished"
        );

        if state.status == ExchangeStatus::Completed {
            self.cache.invalidate(&target_id);
        }

        self.events.publish(DomainEvent::ExchangeFinished {
            generation,
            target_id,
            status: state.status,
            steps: state.steps.len(),
            timestamp: Utc::now(),
        });
    }
}

fn is_active(core: &Core, generation: Generation) -> bool {
    core.active
        .as_ref()
        .is_some_and(|token| token.generation() == generation)
}

/// Drives at most one exchange at a time and exposes its transcript.
pub struct ExchangeController {
    transport: Arc<dyn TransportAdapter>,
    defaults: ExchangeDefaults,
    hub: Hub,
}

impl ExchangeController {
    /// Create a controller with default options and no default target.
    pub fn new(transport: Arc<dyn TransportAdapter>) -> Self {
        let initial = Arc::new(TranscriptState::idle());
        let (publisher, _) = watch::channel(Arc::clone(&initial));
        let defaults = ExchangeDefaults::default();

        Self {
            transport,
            hub: Hub {
                core: Arc::new(Mutex::new(Core {
                    generation: Generation::default(),
                    active: None,
                    default_target: None,
                    state: initial,
                })),
                publisher: Arc::new(publisher),
                cache: Arc::new(NoopCache),
                events: Arc::new(EventBus::default()),
                failure_message: Arc::from(defaults.transport_failure_message.as_str()),
            },
            defaults,
        }
    }

    /// Build a controller from loaded configuration.
    pub fn from_config(config: &AppConfig, transport: Arc<dyn TransportAdapter>) -> Self {
        Self::new(transport)
            .with_defaults(ExchangeDefaults::from_config(config))
            .with_event_bus(Arc::new(EventBus::new(config.assistant.event_bus_capacity)))
            .with_default_target(config.assistant.default_conversation.clone())
    }

    pub fn with_defaults(mut self, defaults: ExchangeDefaults) -> Self {
        self.hub.failure_message = Arc::from(defaults.transport_failure_message.as_str());
        self.defaults = defaults;
        self
    }

    /// Conversation used when `send` does not name one.
    pub fn with_default_target(self, target_id: Option<String>) -> Self {
        self.set_default_target(target_id);
        self
    }

    /// Collaborator notified when an exchange completes.
    pub fn with_cache(mut self, cache: Arc<dyn TranscriptCache>) -> Self {
        self.hub.cache = cache;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.hub.events = events;
        self
    }

    pub fn set_default_target(&self, target_id: Option<String>) {
        self.hub.lock().default_target = target_id;
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.hub.events)
    }

    /// The latest published transcript.
    pub fn snapshot(&self) -> Arc<TranscriptState> {
        Arc::clone(&self.hub.lock().state)
    }

    /// Receive every transcript published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TranscriptState>> {
        self.hub.publisher.subscribe()
    }

    /// Last generation handed out by `send`.
    pub fn current_generation(&self) -> Generation {
        self.hub.lock().generation
    }

    /// Start a new exchange, cancelling any exchange still streaming.
    ///
    /// Returns `None` without changing anything when no target conversation
    /// can be resolved or when called outside a Tokio runtime.
    pub fn send(&self, content: impl Into<String>, options: SendOptions) -> Option<ExchangeHandle> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot start exchange outside a Tokio runtime: {e}");
                return None;
            }
        };

        let (token, target_id, superseded) = {
            let mut core = self.hub.lock();

            let Some(target_id) = options
                .target_id
                .clone()
                .or_else(|| core.default_target.clone())
            else {
                debug!("No target conversation, ignoring send");
                return None;
            };

            let superseded = self.hub.cancel_locked(&mut core);

            core.generation = core.generation.next();
            let token = CancelToken::new(core.generation);
            core.active = Some(token.clone());
            self.hub.publish(
                &mut core,
                TranscriptState::streaming(ExchangeInfo::new(target_id.as_str())),
            );

            (token, target_id, superseded)
        };

        if let Some(previous) = superseded {
            self.hub.events.publish(DomainEvent::ExchangeSuperseded {
                superseded: previous.generation,
                timestamp: Utc::now(),
            });
            self.hub.announce(previous);
        }

        let generation = token.generation();
        info!(
            generation = %generation,
            target = %target_id,
            transport = self.transport.name(),
            "Exchange started"
        );
        self.hub.events.publish(DomainEvent::ExchangeStarted {
            generation,
            target_id: target_id.clone(),
            transport: self.transport.name().to_string(),
            timestamp: Utc::now(),
        });

        let request = ExchangeRequest {
            target_id,
            content: content.into(),
            options: options.resolve(&self.defaults),
        };
        let sink = {
            let hub = self.hub.clone();
            EventSink::new(move |event| hub.on_event(generation, event))
        };
        let transport = Arc::clone(&self.transport);
        let hub = self.hub.clone();

        let task = runtime.spawn(async move {
            let result = transport.start_exchange(request, token, sink).await;
            hub.settle(generation, result);
        });

        Some(ExchangeHandle { generation, task })
    }

    /// Stop accepting events from the current exchange.
    ///
    /// A streaming transcript becomes `Cancelled`; a finished one keeps its
    /// status. Calling this with nothing in flight does nothing.
    pub fn cancel(&self) {
        let finished = {
            let mut core = self.hub.lock();
            self.hub.cancel_locked(&mut core)
        };
        if let Some(finished) = finished {
            self.hub.announce(finished);
        }
    }

    /// Cancel, then return the transcript to its idle value.
    pub fn reset(&self) {
        let finished = {
            let mut core = self.hub.lock();
            let finished = self.hub.cancel_locked(&mut core);
            self.hub.publish(&mut core, TranscriptState::idle());
            finished
        };
        if let Some(finished) = finished {
            self.hub.announce(finished);
        }
    }
}

impl std::fmt::Debug for ExchangeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.hub.lock();
        f.debug_struct("ExchangeController")
            .field("transport", &self.transport.name())
            .field("generation", &core.generation)
            .field("status", &core.state.status)
            .field("defaults", &self.defaults)
            .finish()
    }
}
