//! # LedgerLens Core
//!
//! Domain types, traits, and error definitions for the LedgerLens assistant
//! transcript. This crate has **no runtime policy** in it: it defines the
//! event vocabulary, the transcript model, and the boundaries that the
//! assistant crate and any transport implementation are written against.
//!
//! ## Layout
//!
//! - [`stream`]: events delivered by a transport during one exchange
//! - [`transcript`]: the observable transcript state built from those events
//! - [`transport`]: the adapter trait, cancellation token, and request options
//! - [`cache`]: the collaborator told to refresh a persisted transcript
//! - [`event`]: domain events for observability

pub mod cache;
pub mod error;
pub mod event;
pub mod stream;
pub mod transcript;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use cache::{NoopCache, TranscriptCache};
pub use error::{Error, Result, TransportError};
pub use event::{DomainEvent, EventBus};
pub use stream::StreamEvent;
pub use transcript::{ExchangeInfo, ExchangeStatus, Step, ToolCallRecord, TranscriptState};
pub use transport::{
    CancelToken, EventSink, ExchangeOptions, ExchangeRequest, Generation, ReasoningConfig,
    TransportAdapter,
};
