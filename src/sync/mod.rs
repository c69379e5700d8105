// Synchronization engine
// Owns the remote client, the conversation cache and the tombstone store, and is the only
// place where any of them is mutated.

use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

pub mod cache;
pub mod connectivity;
pub mod tombstones;

pub use cache::{EntryKey, MessageCache, MessageRef};
pub use connectivity::ConnectivityMonitor;
pub use tombstones::TombstoneStore;

use crate::error::{Result, SyncError};
use crate::models::{Connectivity, Identity, Message, OutgoingMessage};
use crate::remote::RemoteService;

const NOTICE_CHANNEL_CAPACITY: usize = 100;

/// Something the user should be told about. None of these are fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Offline,
    FetchFailed(String),
    SendFailed { text: String, reason: String },
    DeleteDeferred { id: i64, reason: String },
    ReplayIncomplete { pending: Vec<i64> },
    TombstoneNotPersisted { id: i64, reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Offline => write!(f, "You are offline. Changes are kept locally."),
            Notice::FetchFailed(reason) => write!(f, "Failed to fetch messages from the server: {}", reason),
            Notice::SendFailed { reason, .. } => write!(f, "Server: Message could not be sent ({})", reason),
            Notice::DeleteDeferred { id, reason } => write!(
                f,
                "Message {} deleted locally; the server will be updated later ({})",
                id, reason
            ),
            Notice::ReplayIncomplete { pending } => write!(
                f,
                "{} deletion(s) could not be synced yet: {:?}",
                pending.len(),
                pending
            ),
            Notice::TombstoneNotPersisted { id, reason } => write!(
                f,
                "Deletion of message {} could not be saved to disk: {}",
                id, reason
            ),
        }
    }
}

/// Result of one pass over the tombstone set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub confirmed: Vec<i64>,
    pub pending: Vec<i64>,
}

impl ReplayReport {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug)]
pub enum SendOutcome {
    /// The provisional entry now carries the server's id
    Sent { key: EntryKey, id: i64, reply: Option<String> },
    /// The provisional entry stays in the cache, unpromoted, for good
    Failed { key: EntryKey, error: SyncError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Provisional message; nothing existed server-side
    LocalOnly,
    /// Server confirmed, tombstone already cleared
    Confirmed(i64),
    /// Tombstoned, waiting for the next replay
    Deferred(i64),
}

pub struct SyncEngine {
    remote: Arc<dyn RemoteService>,
    monitor: ConnectivityMonitor,
    tombstones: TombstoneStore,
    cache: MessageCache,
    identity: Identity,
    connectivity: Connectivity,
    started: bool,
    notice_tx: mpsc::Sender<Notice>,
}

impl SyncEngine {
    /// The tombstone store is expected to be opened (and therefore loaded) already, so
    /// pending deletions are known before the first status check.
    pub fn new(
        remote: Arc<dyn RemoteService>,
        tombstones: TombstoneStore,
        identity: Identity,
    ) -> (Self, mpsc::Receiver<Notice>) {
        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_CHANNEL_CAPACITY);

        let engine = Self {
            monitor: ConnectivityMonitor::new(remote.clone()),
            remote,
            tombstones,
            cache: MessageCache::new(),
            identity,
            connectivity: Connectivity::Uninitialized,
            started: false,
            notice_tx,
        };
        (engine, notice_rx)
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub fn tombstones(&self) -> &TombstoneStore {
        &self.tombstones
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Outcome of the most recent status check. Only informational; every round of remote work
    /// checks again.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn pending_deletions(&self) -> BTreeSet<i64> {
        self.tombstones.all()
    }

    fn notify(&self, notice: Notice) {
        match self.notice_tx.try_send(notice) {
            Ok(()) => (),
            Err(mpsc::error::TrySendError::Full(notice)) => {
                warn!("Notice channel full, dropping: {}", notice)
            }
            Err(mpsc::error::TrySendError::Closed(notice)) => {
                debug!("No notice listener: {}", notice)
            }
        }
    }

    fn note_failure(&mut self, e: &SyncError) {
        if e.is_unreachable() {
            self.connectivity = Connectivity::Offline;
        }
    }

    pub async fn probe(&mut self) -> Connectivity {
        self.connectivity = self.monitor.probe().await;
        self.connectivity
    }

    /// Startup sequence: status check, then replay and fetch if the service answers.
    pub async fn start(&mut self) -> Result<Connectivity> {
        if self.started {
            return Err(SyncError::AlreadyStarted);
        }
        self.started = true;
        info!(
            "Starting sync for {} <-> {} with {} pending deletion(s)",
            self.identity.local,
            self.identity.peer,
            self.tombstones.len()
        );

        if self.probe().await.is_online() {
            self.replay_tombstones().await;
            // A failed fetch is already surfaced as a notice
            let _ = self.fetch().await;
        } else {
            info!("Starting offline; working locally");
            self.notify(Notice::Offline);
        }
        Ok(self.connectivity)
    }

    /// User-triggered resync. Fails with `SyncError::Offline` when the status check does.
    pub async fn refresh(&mut self) -> Result<usize> {
        if !self.probe().await.is_online() {
            self.notify(Notice::Offline);
            return Err(SyncError::Offline);
        }
        self.replay_tombstones().await;
        self.fetch().await
    }

    /// Re-issue every pending deletion. Ids the server accepts are cleared, the rest stay.
    pub async fn replay_tombstones(&mut self) -> ReplayReport {
        // Snapshot: deletions recorded while this pass runs wait for the next one
        let snapshot = self.tombstones.all();
        let mut report = ReplayReport::default();
        if snapshot.is_empty() {
            return report;
        }
        info!("Replaying {} pending deletion(s)", snapshot.len());

        for id in snapshot {
            match self.remote.delete(id).await {
                Ok(()) => match self.tombstones.remove(id) {
                    Ok(_) => report.confirmed.push(id),
                    Err(e) => {
                        error!("Deleted {} on the server but could not clear its tombstone: {}", id, e);
                        report.pending.push(id);
                    }
                },
                Err(e) => {
                    warn!("Replay of deletion {} failed: {}", id, e);
                    self.note_failure(&e);
                    report.pending.push(id);
                }
            }
        }

        if !report.is_complete() {
            self.notify(Notice::ReplayIncomplete {
                pending: report.pending.clone(),
            });
        }
        report
    }

    /// Install the server's history for this conversation. Leaves the cache alone on failure.
    pub async fn fetch(&mut self) -> Result<usize> {
        let history = match self
            .remote
            .history(&self.identity.local, &self.identity.peer)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                error!("Failed to fetch history: {}", e);
                self.note_failure(&e);
                self.notify(Notice::FetchFailed(e.to_string()));
                return Err(e);
            }
        };

        // Local edits the server has not caught up with are layered back on top; failed
        // sends keep their entry keys
        let tombstoned = self.tombstones.all();
        let messages: Vec<Message> = history
            .into_iter()
            .map(Message::from)
            .filter(|message| !tombstoned.contains(&message.id))
            .collect();

        let installed = self.cache.replace_all_keeping_failed(messages);
        info!("Installed {} message(s) from the server", installed);
        Ok(installed)
    }

    /// Optimistically append `text` and try to deliver it. Never retried.
    pub async fn send(&mut self, text: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Err(SyncError::EmptyMessage);
        }
        let key = self
            .cache
            .append_provisional(Message::provisional(&self.identity, text))?;

        let outgoing = OutgoingMessage {
            sender: self.identity.local.clone(),
            receiver: self.identity.peer.clone(),
            message: text.to_string(),
        };

        match self.remote.send(&outgoing).await {
            Ok(receipt) => {
                self.cache.promote(key, receipt.id);
                if let Some(reply) = &receipt.reply {
                    self.cache.append(Message::from_peer(&self.identity, reply));
                }
                debug!("Message promoted to id {}", receipt.id);
                Ok(SendOutcome::Sent {
                    key,
                    id: receipt.id,
                    reply: receipt.reply,
                })
            }
            Err(e) => {
                warn!("Send failed, keeping the message locally: {}", e);
                self.cache.mark_failed(key);
                self.note_failure(&e);
                self.notify(Notice::SendFailed {
                    text: text.to_string(),
                    reason: e.to_string(),
                });
                Ok(SendOutcome::Failed { key, error: e })
            }
        }
    }

    /// Remove a message locally and, if the server knows it, make sure the server forgets it
    /// too: immediately when online, otherwise on a later replay.
    pub async fn delete(&mut self, target: MessageRef) -> Result<DeleteOutcome> {
        let removed = self.cache.remove(target).ok_or(SyncError::NotInCache)?;
        if removed.is_provisional() {
            debug!("Removed provisional message locally");
            return Ok(DeleteOutcome::LocalOnly);
        }
        let id = removed.id;

        // An unwritten tombstone is not kept; the message comes back on the next fetch
        if let Err(e) = self.tombstones.add(id) {
            error!("Failed to persist tombstone for {}: {}", id, e);
            self.notify(Notice::TombstoneNotPersisted {
                id,
                reason: e.to_string(),
            });
        }

        if !self.probe().await.is_online() {
            self.notify(Notice::DeleteDeferred {
                id,
                reason: "offline".to_string(),
            });
            return Ok(DeleteOutcome::Deferred(id));
        }

        match self.remote.delete(id).await {
            Ok(()) => {
                if let Err(e) = self.tombstones.remove(id) {
                    warn!("Deleted {} on the server but could not clear its tombstone: {}", id, e);
                }
                Ok(DeleteOutcome::Confirmed(id))
            }
            Err(e) => {
                warn!("Remote delete of {} failed, queued for replay: {}", id, e);
                self.note_failure(&e);
                self.notify(Notice::DeleteDeferred {
                    id,
                    reason: e.to_string(),
                });
                Ok(DeleteOutcome::Deferred(id))
            }
        }
    }
}
