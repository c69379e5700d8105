//! Error types for the synchronization core
//!
//! Remote failures fall into three buckets (unreachable, rejected, malformed); the rest are
//! local conditions the engine refuses to act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection refused, DNS failure or transport timeout
    #[error("Message service unreachable: {0}")]
    TransportUnreachable(String),

    /// Service answered with a non-success status
    #[error("Message service rejected the request with status {status}: {body}")]
    RemoteRejected { status: u16, body: String },

    /// Success status but the body is not what the contract promises
    #[error("Malformed response from message service: {0}")]
    MalformedResponse(String),

    #[error("Refusing to send an empty message")]
    EmptyMessage,

    /// Another provisional message is still waiting for its send to settle
    #[error("A send is already in flight")]
    SendInFlight,

    #[error("Message is not in the local cache")]
    NotInCache,

    #[error("Message service is offline")]
    Offline,

    #[error("Sync engine already started")]
    AlreadyStarted,

    #[error("Tombstone storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Tombstone file is corrupt: {0}")]
    CorruptTombstones(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether the failure means the service could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, SyncError::TransportUnreachable(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
