//! The change journal.
//!
//! Pending mutations are kept per [`Kind`] as a JSON array of field maps
//! under `{store_id}-{kind}` in the local [`KeyValueStore`]. Every mutation
//! reads the current array, applies the change and writes it back before
//! returning, so the journal on disk is always current.

use crate::error::SyncResult;
use offsync_model::JournalEntry;
use offsync_storage::{read_snapshots, write_snapshots, KeyValueStore, StorageError};
use offsync_types::{Identity, Kind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Identity-keyed record of pending mutations, partitioned by [`Kind`].
pub struct ChangeJournal {
    store: Arc<dyn KeyValueStore>,
    store_id: String,
    id_property: String,
    /// Serialises read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl ChangeJournal {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        store_id: impl Into<String>,
        id_property: impl Into<String>,
    ) -> Self {
        Self {
            store,
            store_id: store_id.into(),
            id_property: id_property.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    /// The persistence key for a kind: `{store_id}-{kind}`.
    pub fn key(&self, kind: Kind) -> String {
        format!("{}-{}", self.store_id, kind.as_str())
    }

    /// Returns the pending entries for a kind; empty if none.
    pub fn read(&self, kind: Kind) -> SyncResult<Vec<JournalEntry>> {
        let snapshots = read_snapshots(self.store.as_ref(), &self.key(kind))?;
        let entries = snapshots
            .iter()
            .map(|snapshot| JournalEntry::from_snapshot(snapshot, &self.id_property))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Returns true if `identity` has a pending entry under `kind`.
    pub fn contains(&self, kind: Kind, identity: &Identity) -> SyncResult<bool> {
        Ok(self
            .read(kind)?
            .iter()
            .any(|entry| entry.identity() == identity))
    }

    /// Files `entries` under `kind`.
    ///
    /// With `replace` the kind ends up holding exactly `entries`. Without it,
    /// incoming entries overwrite existing ones with the same identity in
    /// place, new identities are appended, and everything else is kept.
    /// Either way no identity appears twice.
    pub fn upsert(&self, kind: Kind, entries: Vec<JournalEntry>, replace: bool) -> SyncResult<()> {
        let _guard = self.lock()?;
        let merged = if replace {
            merge_entries(Vec::new(), entries)
        } else {
            merge_entries(self.read(kind)?, entries)
        };
        debug!(
            "journal {}: {} entries (replace={})",
            self.key(kind),
            merged.len(),
            replace
        );
        self.persist(kind, &merged)
    }

    /// Empties one kind.
    pub fn clear(&self, kind: Kind) -> SyncResult<()> {
        let _guard = self.lock()?;
        debug!("journal {}: cleared", self.key(kind));
        self.store.remove(&self.key(kind))?;
        Ok(())
    }

    /// Empties every kind.
    pub fn clear_all(&self) -> SyncResult<()> {
        for kind in Kind::ALL {
            self.clear(kind)?;
        }
        Ok(())
    }

    /// Removes the entry for `identity` under `kind`.
    /// Returns whether an entry was removed.
    pub fn remove_by_identity(&self, kind: Kind, identity: &Identity) -> SyncResult<bool> {
        let _guard = self.lock()?;
        let mut entries = self.read(kind)?;
        let before = entries.len();
        entries.retain(|entry| entry.identity() != identity);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(kind, &entries)?;
        Ok(true)
    }

    /// Returns true if anything is pending under `kind`.
    pub fn has_pending(&self, kind: Kind) -> SyncResult<bool> {
        Ok(!self.read(kind)?.is_empty())
    }

    /// Returns true if anything is pending under any kind.
    pub fn has_pending_any(&self) -> SyncResult<bool> {
        for kind in Kind::ALL {
            if self.has_pending(kind)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn persist(&self, kind: Kind, entries: &[JournalEntry]) -> SyncResult<()> {
        let snapshots: Vec<_> = entries
            .iter()
            .map(|entry| entry.to_snapshot(&self.id_property))
            .collect();
        write_snapshots(self.store.as_ref(), &self.key(kind), &snapshots)?;
        Ok(())
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StorageError::Backend("journal lock poisoned".into()).into())
    }
}

/// Merges `incoming` into `existing` by identity; incoming wins.
///
/// Existing entries keep their position, new identities are appended in
/// arrival order, and duplicates inside `incoming` collapse to the last one.
pub(crate) fn merge_entries(
    existing: Vec<JournalEntry>,
    incoming: Vec<JournalEntry>,
) -> Vec<JournalEntry> {
    let mut index: HashMap<Identity, usize> = HashMap::with_capacity(existing.len());
    let mut kept = Vec::with_capacity(existing.len() + incoming.len());
    for entry in existing {
        if !index.contains_key(entry.identity()) {
            index.insert(entry.identity().clone(), kept.len());
            kept.push(entry);
        }
    }
    for entry in incoming {
        match index.get(entry.identity()) {
            Some(&position) => kept[position] = entry,
            None => {
                index.insert(entry.identity().clone(), kept.len());
                kept.push(entry);
            }
        }
    }
    kept
}
