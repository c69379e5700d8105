use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Identity;

const APP_DIR: &str = "chatsync";
const TOMBSTONE_FILE: &str = "offline_deleted.json";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub local_identity: String,
    pub peer_identity: String,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tombstone_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let identity = Identity::default();
        ClientConfig {
            server_url: "http://localhost:8000".to_string(),
            local_identity: identity.local,
            peer_identity: identity.peer,
            request_timeout_secs: 5,
            tombstone_path: None,
        }
    }
}

impl ClientConfig {
    /// Let `CHATSYNC_SERVER`, `CHATSYNC_SENDER` and `CHATSYNC_RECEIVER` override the file.
    pub fn apply_env(&mut self) {
        if let Ok(server) = env::var("CHATSYNC_SERVER") {
            self.server_url = server;
        }
        if let Ok(sender) = env::var("CHATSYNC_SENDER") {
            self.local_identity = sender;
        }
        if let Ok(receiver) = env::var("CHATSYNC_RECEIVER") {
            self.peer_identity = receiver;
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(&self.local_identity, &self.peer_identity)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Where the tombstone set lives: the configured path, or the user data directory.
    pub fn tombstone_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.tombstone_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join(APP_DIR);
        fs::create_dir_all(&data_dir)?;
        Ok(data_dir.join(TOMBSTONE_FILE))
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join(APP_DIR);

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

/// Read the config file, falling back to defaults when there is none.
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(ClientConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: ClientConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    info!("Loaded config from {}", path.display());

    Ok(config)
}

pub fn save_config(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;

    info!("Config saved to {}", path.display());
    Ok(())
}
