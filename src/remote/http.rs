// HTTP implementation of the remote message service

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::models::{OutgoingMessage, RemoteMessage, SendReceipt};
use crate::remote::{endpoints, RemoteService};

pub struct HttpRemote {
    base_url: String,
    client: Client,
}

impl HttpRemote {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| SyncError::TransportUnreachable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::TransportUnreachable(format!("request timed out: {}", e))
    } else {
        SyncError::TransportUnreachable(e.to_string())
    }
}

async fn rejected(response: Response) -> SyncError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    SyncError::RemoteRejected {
        status: status.as_u16(),
        body,
    }
}

/// A plain 404, or the FastAPI service's own 404 re-raised by its catch-all handler as
/// `500 {"detail": "Database Error: 404: ..."}`.
fn is_not_found(error: &SyncError) -> bool {
    match error {
        SyncError::RemoteRejected { status: 404, .. } => true,
        SyncError::RemoteRejected { status: 500, body } => body.contains("404:"),
        _ => false,
    }
}

/// Pull the assigned id (number or numeric string) and optional reply out of a send response.
pub fn parse_send_receipt(body: &str) -> Result<SendReceipt> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| SyncError::MalformedResponse(format!("send response is not JSON: {}", e)))?;

    let id = match value.get("id") {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let reply = match value.get("response") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };

    match id {
        Some(id) if id >= 0 => Ok(SendReceipt { id, reply }),
        _ => Err(SyncError::MalformedResponse(format!(
            "send response carries no usable id: {}",
            body
        ))),
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn status(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url(endpoints::STATUS))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(())
    }

    async fn history(&self, sender: &str, receiver: &str) -> Result<Vec<RemoteMessage>> {
        let response = self
            .client
            .get(self.url(endpoints::HISTORY))
            .query(&[("sender", sender), ("receiver", receiver)])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let error = rejected(response).await;
            // The service answers not-found when the pair has never exchanged a message
            if is_not_found(&error) {
                debug!("No history yet between {} and {}", sender, receiver);
                return Ok(Vec::new());
            }
            return Err(error);
        }

        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str::<Vec<RemoteMessage>>(&body)
            .map_err(|e| SyncError::MalformedResponse(format!("history is not a message array: {}", e)))
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<SendReceipt> {
        let response = self
            .client
            .post(self.url(endpoints::SEND))
            .json(message)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let body = response.text().await.map_err(transport_error)?;
        parse_send_receipt(&body)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("{}/{}", endpoints::DELETE, id)))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let error = rejected(response).await;
            if is_not_found(&error) {
                warn!("Message {} already absent on the server, treating delete as done", id);
                return Ok(());
            }
            return Err(error);
        }
        Ok(())
    }
}
