use serde::{Deserialize, Serialize};

/// Id carried by a message the server has not assigned an identifier to yet.
pub const PROVISIONAL_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub text: String,
    pub timestamp: String,
    pub delivery_status: DeliveryStatus,
}

impl Message {
    /// Build a locally created message with no server id, stamped with the current time.
    pub fn provisional(identity: &Identity, text: &str) -> Self {
        Message {
            id: PROVISIONAL_ID,
            sender: identity.local.clone(),
            receiver: identity.peer.clone(),
            text: text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            delivery_status: DeliveryStatus::Sending,
        }
    }

    /// A message authored by the peer, e.g. the automated reply to a send.
    ///
    /// The service does not return the reply's id, so it carries `PROVISIONAL_ID` until the
    /// next fetch replaces it with the stored copy. Its `Delivered` status is what sets it
    /// apart from an unconfirmed send: only `Sending` and `Failed` entries await the server.
    pub fn from_peer(identity: &Identity, text: &str) -> Self {
        Message {
            id: PROVISIONAL_ID,
            sender: identity.peer.clone(),
            receiver: identity.local.clone(),
            text: text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            delivery_status: DeliveryStatus::Delivered,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id == PROVISIONAL_ID
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Whether the message was written by the local participant.
    pub fn is_outgoing(&self, identity: &Identity) -> bool {
        self.sender == identity.local
    }
}

impl From<RemoteMessage> for Message {
    fn from(remote: RemoteMessage) -> Self {
        Message {
            id: remote.id,
            sender: remote.sender,
            receiver: remote.receiver,
            text: remote.message.unwrap_or_default(),
            timestamp: remote.timestamp,
            delivery_status: DeliveryStatus::Delivered,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum DeliveryStatus {
    Sending,   // Provisional, request outstanding
    Sent,      // Server assigned an id
    Failed,    // Send failed; stays provisional forever
    Delivered, // Came from the server or the peer
}

/// The fixed participant pair of the single conversation this client follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub local: String,
    pub peer: String,
}

impl Identity {
    pub fn new(local: &str, peer: &str) -> Self {
        Identity {
            local: local.to_string(),
            peer: peer.to_string(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::new("You", "TestUser")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Uninitialized,
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(&self) -> bool {
        matches!(self, Connectivity::Online)
    }
}

/// A history entry as the message service returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteMessage {
    pub id: i64,
    pub sender: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

/// Body of a send request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutgoingMessage {
    pub sender: String,
    pub receiver: String,
    pub message: String,
}

/// What the service hands back for an accepted send.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReceipt {
    pub id: i64,
    pub reply: Option<String>,
}
