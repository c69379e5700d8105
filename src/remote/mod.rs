// Remote message service seam
// The engine only ever talks to the service through this trait; `http` holds the real client.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{OutgoingMessage, RemoteMessage, SendReceipt};

pub mod http;

pub use http::HttpRemote;

// Endpoint paths, relative to the configured base URL
pub mod endpoints {
    pub const STATUS: &str = "/status";
    pub const HISTORY: &str = "/api/history/";
    pub const SEND: &str = "/api/send/";
    pub const DELETE: &str = "/api/delete";
}

/// Request/response contract of the message service.
///
/// Every call is bounded by the implementation's own transport timeout; a hung call surfaces
/// as `SyncError::TransportUnreachable`.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Lightweight status check. `Ok(())` only for a success response.
    async fn status(&self) -> Result<()>;

    /// Full history between `sender` and `receiver`, oldest first.
    async fn history(&self, sender: &str, receiver: &str) -> Result<Vec<RemoteMessage>>;

    async fn send(&self, message: &OutgoingMessage) -> Result<SendReceipt>;

    /// Delete by id. Deleting an id the service no longer has counts as success.
    async fn delete(&self, id: i64) -> Result<()>;
}
