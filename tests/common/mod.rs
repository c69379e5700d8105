// Common test utilities for integration tests
// An in-memory message service standing in for the real one, plus shared setup.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use log::LevelFilter;
use tempfile::TempDir;
use tokio::sync::mpsc;

use chatsync::{
    Identity, Notice, OutgoingMessage, RemoteMessage, RemoteService, Result, SendReceipt,
    SyncEngine, SyncError, TombstoneStore,
};

static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[derive(Default)]
struct MockState {
    online: bool,
    messages: Vec<RemoteMessage>,
    next_id: i64,
    reply: Option<String>,
    rejected_deletes: BTreeSet<i64>,
    history_status: Option<u16>,
    status_calls: usize,
    delete_calls: Vec<i64>,
    send_calls: Vec<OutgoingMessage>,
}

/// Message service kept in memory. Deletes are idempotent like the real one.
pub struct MockRemote {
    state: Mutex<MockState>,
}

impl MockRemote {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                online,
                next_id: 1,
                ..MockState::default()
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    pub fn seed(&self, id: i64, sender: &str, receiver: &str, text: &str) {
        let mut state = self.state();
        state.messages.push(RemoteMessage {
            id,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            message: Some(text.to_string()),
            timestamp: format!("2024-01-01T00:00:{:02}", id % 60),
        });
        state.next_id = state.next_id.max(id + 1);
    }

    pub fn set_next_id(&self, id: i64) {
        self.state().next_id = id;
    }

    pub fn set_reply(&self, reply: Option<&str>) {
        self.state().reply = reply.map(str::to_string);
    }

    pub fn reject_delete(&self, id: i64) {
        self.state().rejected_deletes.insert(id);
    }

    pub fn allow_delete(&self, id: i64) {
        self.state().rejected_deletes.remove(&id);
    }

    pub fn fail_history(&self, status: Option<u16>) {
        self.state().history_status = status;
    }

    pub fn contains(&self, id: i64) -> bool {
        self.state().messages.iter().any(|m| m.id == id)
    }

    pub fn status_calls(&self) -> usize {
        self.state().status_calls
    }

    pub fn delete_calls(&self) -> Vec<i64> {
        self.state().delete_calls.clone()
    }

    pub fn send_calls(&self) -> Vec<OutgoingMessage> {
        self.state().send_calls.clone()
    }
}

fn unreachable() -> SyncError {
    SyncError::TransportUnreachable("connection refused".to_string())
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn status(&self) -> Result<()> {
        let mut state = self.state();
        state.status_calls += 1;
        if state.online { Ok(()) } else { Err(unreachable()) }
    }

    async fn history(&self, sender: &str, receiver: &str) -> Result<Vec<RemoteMessage>> {
        let state = self.state();
        if !state.online {
            return Err(unreachable());
        }
        if let Some(status) = state.history_status {
            return Err(SyncError::RemoteRejected {
                status,
                body: "Database Error".to_string(),
            });
        }
        Ok(state
            .messages
            .iter()
            .filter(|m| {
                (m.sender == sender && m.receiver == receiver)
                    || (m.sender == receiver && m.receiver == sender)
            })
            .cloned()
            .collect())
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<SendReceipt> {
        let mut state = self.state();
        state.send_calls.push(message.clone());
        if !state.online {
            return Err(unreachable());
        }

        let id = state.next_id;
        state.next_id += 1;
        state.messages.push(RemoteMessage {
            id,
            sender: message.sender.clone(),
            receiver: message.receiver.clone(),
            message: Some(message.message.clone()),
            timestamp: "2024-01-02T00:00:00".to_string(),
        });

        let reply = state.reply.clone();
        if let Some(text) = &reply {
            let reply_id = state.next_id;
            state.next_id += 1;
            state.messages.push(RemoteMessage {
                id: reply_id,
                sender: message.receiver.clone(),
                receiver: message.sender.clone(),
                message: Some(text.clone()),
                timestamp: "2024-01-02T00:00:00".to_string(),
            });
        }
        Ok(SendReceipt { id, reply })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut state = self.state();
        state.delete_calls.push(id);
        if !state.online {
            return Err(unreachable());
        }
        if state.rejected_deletes.contains(&id) {
            return Err(SyncError::RemoteRejected {
                status: 500,
                body: "Database Error".to_string(),
            });
        }
        state.messages.retain(|m| m.id != id);
        Ok(())
    }
}

pub fn tombstone_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("offline_deleted.json")
}

pub fn new_engine(remote: &Arc<MockRemote>, dir: &TempDir) -> (SyncEngine, mpsc::Receiver<Notice>) {
    let store = TombstoneStore::open(tombstone_path(dir)).expect("open tombstone store");
    SyncEngine::new(remote.clone(), store, Identity::default())
}

pub fn drain(notice_rx: &mut mpsc::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = notice_rx.try_recv() {
        notices.push(notice);
    }
    notices
}

pub fn cached_ids(engine: &SyncEngine) -> Vec<i64> {
    engine.cache().ordered().iter().map(|m| m.id).collect()
}
