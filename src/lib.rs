// Re-export modules for the binary and the integration tests
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;

// Re-export main types for convenience
pub use error::{Result, SyncError};
pub use models::*;
pub use remote::{HttpRemote, RemoteService};
pub use sync::{DeleteOutcome, MessageRef, Notice, SendOutcome, SyncEngine, TombstoneStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_message_fields() {
        let identity = Identity::default();
        let msg = Message::provisional(&identity, "hi");

        assert_eq!(msg.id, PROVISIONAL_ID);
        assert!(msg.is_provisional());
        assert!(msg.is_outgoing(&identity));
        assert_eq!(msg.sender, "You");
        assert_eq!(msg.receiver, "TestUser");
        assert_eq!(msg.delivery_status, DeliveryStatus::Sending);
        assert!(chrono::DateTime::parse_from_rfc3339(&msg.timestamp).is_ok());
    }

    #[test]
    fn test_peer_message_is_incoming() {
        let identity = Identity::default();
        let reply = Message::from_peer(&identity, "hello");

        assert!(!reply.is_outgoing(&identity));
        assert_eq!(reply.sender, "TestUser");
        assert_eq!(reply.delivery_status, DeliveryStatus::Delivered);
    }

    #[test]
    fn test_remote_message_conversion() {
        let remote: RemoteMessage = serde_json::from_str(
            r#"{"id": 3, "sender": "TestUser", "receiver": "You", "message": "yo", "timestamp": "2024-05-01T10:00:00"}"#,
        )
        .unwrap();
        let msg = Message::from(remote);

        assert_eq!(msg.id, 3);
        assert_eq!(msg.text, "yo");
        assert!(!msg.is_blank());

        // Null or absent text converts to a blank message, which the cache filters out
        let remote: RemoteMessage =
            serde_json::from_str(r#"{"id": 4, "sender": "You", "message": null}"#).unwrap();
        assert!(Message::from(remote).is_blank());
    }

    #[test]
    fn test_blank_detection() {
        let identity = Identity::default();
        assert!(Message::provisional(&identity, " \t\n").is_blank());
        assert!(!Message::provisional(&identity, " x ").is_blank());
    }
}
