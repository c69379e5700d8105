// Connectivity probing against the message service

use log::{debug, info};
use std::sync::Arc;

use crate::models::Connectivity;
use crate::remote::RemoteService;

pub struct ConnectivityMonitor {
    remote: Arc<dyn RemoteService>,
}

impl ConnectivityMonitor {
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self { remote }
    }

    /// One status request, no retries. Any failure reads as offline.
    pub async fn probe(&self) -> Connectivity {
        match self.remote.status().await {
            Ok(()) => {
                debug!("Status check succeeded");
                Connectivity::Online
            }
            Err(e) => {
                info!("Status check failed, treating service as offline: {}", e);
                Connectivity::Offline
            }
        }
    }
}
