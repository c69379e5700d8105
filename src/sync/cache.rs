// In-memory view of the conversation, in display (insertion) order

use log::{debug, warn};

use crate::error::{Result, SyncError};
use crate::models::{DeliveryStatus, Message, PROVISIONAL_ID};

/// Handle to one cached entry. Stays valid while the entry is in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey(u64);

/// How a caller points at a message to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRef {
    Id(i64),
    Entry(EntryKey),
}

#[derive(Debug, Clone)]
struct Entry {
    key: EntryKey,
    message: Message,
}

#[derive(Debug, Default)]
pub struct MessageCache {
    entries: Vec<Entry>,
    next_key: u64,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, message: Message) -> EntryKey {
        let key = EntryKey(self.next_key);
        self.next_key += 1;
        self.entries.push(Entry { key, message });
        key
    }

    fn position(&self, key: EntryKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    /// Install a fetched history in place of everything cached. Blank messages are dropped.
    /// Returns how many messages were installed.
    pub fn replace_all(&mut self, messages: Vec<Message>) -> usize {
        self.entries.clear();
        self.install(messages)
    }

    /// Like `replace_all`, but entries whose send failed survive at the tail with their
    /// original keys. Returns how many fetched messages were installed.
    pub fn replace_all_keeping_failed(&mut self, messages: Vec<Message>) -> usize {
        let failed: Vec<Entry> = self
            .entries
            .drain(..)
            .filter(|entry| entry.message.delivery_status == DeliveryStatus::Failed)
            .collect();
        let installed = self.install(messages);
        self.entries.extend(failed);
        installed
    }

    fn install(&mut self, messages: Vec<Message>) -> usize {
        let mut skipped = 0;
        for message in messages {
            if message.is_blank() {
                skipped += 1;
                continue;
            }
            self.push(message);
        }
        if skipped > 0 {
            debug!("Dropped {} blank message(s) from fetched history", skipped);
        }
        self.entries.len()
    }

    /// Append an optimistic local send. Only one may be in flight at a time.
    pub fn append_provisional(&mut self, mut message: Message) -> Result<EntryKey> {
        if self
            .entries
            .iter()
            .any(|entry| entry.message.delivery_status == DeliveryStatus::Sending)
        {
            return Err(SyncError::SendInFlight);
        }
        if message.is_blank() {
            return Err(SyncError::EmptyMessage);
        }
        message.id = PROVISIONAL_ID;
        message.delivery_status = DeliveryStatus::Sending;
        Ok(self.push(message))
    }

    /// Append a non-blank message at the tail.
    pub fn append(&mut self, message: Message) -> Option<EntryKey> {
        if message.is_blank() {
            return None;
        }
        Some(self.push(message))
    }

    /// Give a provisional entry its server id without moving it.
    pub fn promote(&mut self, key: EntryKey, server_id: i64) -> bool {
        match self.position(key) {
            Some(index) => {
                let message = &mut self.entries[index].message;
                message.id = server_id;
                message.delivery_status = DeliveryStatus::Sent;
                true
            }
            None => {
                warn!("Cannot promote entry {:?} to id {}: no longer cached", key, server_id);
                false
            }
        }
    }

    /// Settle a provisional entry whose send did not go through. Its id stays provisional.
    pub fn mark_failed(&mut self, key: EntryKey) -> bool {
        match self.position(key) {
            Some(index) => {
                self.entries[index].message.delivery_status = DeliveryStatus::Failed;
                true
            }
            None => false,
        }
    }

    /// Remove a message, keeping the order of the rest.
    ///
    /// Several entries may carry the provisional id, so `MessageRef::Id(PROVISIONAL_ID)`
    /// never matches; provisional entries are removed by key.
    pub fn remove(&mut self, target: MessageRef) -> Option<Message> {
        let index = match target {
            MessageRef::Id(PROVISIONAL_ID) => None,
            MessageRef::Id(id) => self.entries.iter().position(|entry| entry.message.id == id),
            MessageRef::Entry(key) => self.position(key),
        }?;
        Some(self.entries.remove(index).message)
    }

    pub fn get(&self, key: EntryKey) -> Option<&Message> {
        self.position(key).map(|index| &self.entries[index].message)
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Message> {
        if id == PROVISIONAL_ID {
            return None;
        }
        self.entries
            .iter()
            .map(|entry| &entry.message)
            .find(|message| message.id == id)
    }

    /// Key of the entry at a display position.
    pub fn key_at(&self, index: usize) -> Option<EntryKey> {
        self.entries.get(index).map(|entry| entry.key)
    }

    pub fn ordered(&self) -> Vec<&Message> {
        self.entries.iter().map(|entry| &entry.message).collect()
    }

    pub fn keyed(&self) -> impl Iterator<Item = (EntryKey, &Message)> {
        self.entries.iter().map(|entry| (entry.key, &entry.message))
    }

    /// Copies of provisional messages whose send failed.
    pub fn failed(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|entry| entry.message.delivery_status == DeliveryStatus::Failed)
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
