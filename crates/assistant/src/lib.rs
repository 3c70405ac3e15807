//! Streaming transcript aggregation for the LedgerLens assistant.
//!
//! One exchange with the reasoning service produces an ordered stream of
//! events. This crate turns that stream into a transcript:
//!
//! 1. **Send**: the [`ExchangeController`] cancels anything in flight, resets
//!    the transcript, and opens a new exchange through a transport
//! 2. **Apply**: each event the transport delivers goes through the pure
//!    reducer in [`processor`] and the result replaces the published state
//! 3. **Finish**: a `done` or `error` event, a transport failure, or a
//!    `cancel`/`reset` puts the transcript in a terminal status
//!
//! Events from an exchange that has since been cancelled or replaced are
//! dropped before they reach the reducer.

pub mod controller;
pub mod processor;
pub mod replay;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use controller::{ExchangeController, ExchangeDefaults, ExchangeHandle, SendOptions};
pub use processor::{ApplyOutcome, apply, apply_with_outcome};
pub use replay::ReplayTransport;
