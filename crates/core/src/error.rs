//! Error types for the LedgerLens domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Exchange-level failures
//! never escape the controller as `Err`; they end up in the transcript
//! state. These types describe what a transport reports when it settles.

use thiserror::Error;

/// The top-level error type for LedgerLens operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Recorded event streams ---
    #[error("Invalid recording at line {line}: {reason}")]
    Recording { line: usize, reason: String },

    // --- I/O ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// How a transport's exchange ended when it did not end normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The exchange stopped because its cancel token fired.
    #[error("Exchange cancelled")]
    Cancelled,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Request failed: {message} (status: {status_code})")]
    Http { status_code: u16, message: String },

    #[error("Malformed stream: {0}")]
    Protocol(String),

    #[error("Exchange timed out: {0}")]
    Timeout(String),
}

impl TransportError {
    /// True when the failure is the controller's own cancellation coming back.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
