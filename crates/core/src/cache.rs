//! Transcript cache collaborator.
//!
//! When an exchange completes, the durable copy of the conversation is out
//! of date. Whatever owns it (a query cache, a local store) is told to
//! refresh through this trait.

/// Receives "this conversation changed" notifications.
pub trait TranscriptCache: Send + Sync {
    /// Mark the persisted transcript for `conversation_id` as stale.
    fn invalidate(&self, conversation_id: &str);
}

/// A cache that ignores notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl TranscriptCache for NoopCache {
    fn invalidate(&self, _conversation_id: &str) {}
}
