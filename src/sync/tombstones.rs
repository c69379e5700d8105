//! Durable set of message ids deleted locally but not yet confirmed deleted on the server.
//!
//! The whole set is rewritten on every mutation: serialized to a temp file next to the
//! target and renamed over it, so a crash leaves either the previous or the new set on disk.

use log::{debug, info};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::models::PROVISIONAL_ID;

pub struct TombstoneStore {
    path: PathBuf,
    ids: Mutex<BTreeSet<i64>>,
}

impl TombstoneStore {
    /// Open the store at `path`, loading whatever was persisted there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            ids: Mutex::new(BTreeSet::new()),
        };
        let loaded = store.load()?;
        info!("Loaded {} pending tombstone(s) from {}", loaded.len(), store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the persisted set. A missing file is bootstrapped with an empty set.
    pub fn load(&self) -> Result<BTreeSet<i64>> {
        let mut ids = self.lock();
        if self.path.exists() {
            let contents = fs::read_to_string(&self.path)?;
            let stored: Vec<i64> = if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)?
            };
            *ids = stored.into_iter().filter(|id| *id != PROVISIONAL_ID).collect();
        } else {
            debug!("No tombstone file at {}, creating an empty one", self.path.display());
            ids.clear();
            persist(&self.path, &ids)?;
        }
        Ok(ids.clone())
    }

    /// Record a pending deletion. Returns whether the set changed.
    pub fn add(&self, id: i64) -> Result<bool> {
        if id == PROVISIONAL_ID {
            return Ok(false);
        }
        let mut ids = self.lock();
        if !ids.insert(id) {
            return Ok(false);
        }
        // Memory never holds what the file does not
        if let Err(e) = persist(&self.path, &ids) {
            ids.remove(&id);
            return Err(e);
        }
        debug!("Tombstoned message {}", id);
        Ok(true)
    }

    /// Drop a tombstone once the server confirmed the deletion. Returns whether it was present.
    pub fn remove(&self, id: i64) -> Result<bool> {
        let mut ids = self.lock();
        if !ids.remove(&id) {
            return Ok(false);
        }
        if let Err(e) = persist(&self.path, &ids) {
            ids.insert(id);
            return Err(e);
        }
        debug!("Cleared tombstone for message {}", id);
        Ok(true)
    }

    pub fn all(&self) -> BTreeSet<i64> {
        self.lock().clone()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<i64>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn persist(path: &Path, ids: &BTreeSet<i64>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let contents = serde_json::to_string(&ids.iter().collect::<Vec<_>>())?;
    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
