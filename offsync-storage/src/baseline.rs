//! The local record baseline.
//!
//! The baseline is the full record set as last committed on this device.
//! It holds plain field maps; dirty and phantom flags are in-memory state
//! and are not persisted.

use crate::error::StorageResult;
use crate::kv::KeyValueStore;
use crate::{read_snapshots, write_snapshots};
use offsync_model::{FieldMap, Record};
use offsync_types::Identity;
use std::sync::Arc;
use tracing::debug;

/// Persistent home of the local record baseline.
pub trait RecordStore: Send + Sync {
    /// Loads every persisted record, clean and non-phantom.
    fn load_all(&self) -> StorageResult<Vec<Record>>;

    /// Removes `removals`, then inserts or overwrites `upserts` by identity.
    fn write(&self, upserts: &[Record], removals: &[Identity]) -> StorageResult<()>;

    /// Replaces the record stored under `from` with `record`, keeping its
    /// position. Appends `record` if `from` is unknown.
    fn replace(&self, from: &Identity, record: &Record) -> StorageResult<()>;

    /// Drops the whole baseline.
    fn clear(&self) -> StorageResult<()>;
}

/// [`RecordStore`] that keeps the baseline as one JSON array in a
/// [`KeyValueStore`] under the store id.
pub struct KvRecordStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    id_property: String,
}

impl KvRecordStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        store_id: impl Into<String>,
        id_property: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            key: store_id.into(),
            id_property: id_property.into(),
        }
    }

    /// The key the baseline is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    fn position(&self, snapshots: &[FieldMap], identity: &Identity) -> Option<usize> {
        snapshots.iter().position(|snapshot| {
            snapshot
                .get(&self.id_property)
                .and_then(Identity::from_value)
                .as_ref()
                == Some(identity)
        })
    }
}

impl RecordStore for KvRecordStore {
    fn load_all(&self) -> StorageResult<Vec<Record>> {
        let snapshots = read_snapshots(self.kv.as_ref(), &self.key)?;
        let records = snapshots
            .iter()
            .map(|snapshot| Record::from_snapshot(snapshot, &self.id_property))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("loaded {} baseline records from {}", records.len(), self.key);
        Ok(records)
    }

    fn write(&self, upserts: &[Record], removals: &[Identity]) -> StorageResult<()> {
        if upserts.is_empty() && removals.is_empty() {
            return Ok(());
        }
        let mut snapshots = read_snapshots(self.kv.as_ref(), &self.key)?;
        for identity in removals {
            if let Some(index) = self.position(&snapshots, identity) {
                snapshots.remove(index);
            }
        }
        for record in upserts {
            let snapshot = record.snapshot(&self.id_property);
            match self.position(&snapshots, record.identity()) {
                Some(index) => snapshots[index] = snapshot,
                None => snapshots.push(snapshot),
            }
        }
        debug!(
            "baseline {}: {} upserted, {} removed",
            self.key,
            upserts.len(),
            removals.len()
        );
        write_snapshots(self.kv.as_ref(), &self.key, &snapshots)
    }

    fn replace(&self, from: &Identity, record: &Record) -> StorageResult<()> {
        let mut snapshots = read_snapshots(self.kv.as_ref(), &self.key)?;
        let snapshot = record.snapshot(&self.id_property);
        match self.position(&snapshots, from) {
            Some(index) => snapshots[index] = snapshot,
            None => snapshots.push(snapshot),
        }
        write_snapshots(self.kv.as_ref(), &self.key, &snapshots)
    }

    fn clear(&self) -> StorageResult<()> {
        debug!("clearing baseline {}", self.key);
        self.kv.remove(&self.key)
    }
}
