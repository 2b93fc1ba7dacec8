//! Local persistence layer for offsync.
//!
//! Everything the sync layer keeps on the device goes through a
//! [`KeyValueStore`]: string keys mapped to serialized JSON arrays of field
//! maps. Two backends ship with the crate:
//!
//! - [`MemoryStore`] for tests and ephemeral sessions
//! - [`SqliteStore`] for durable storage in a single SQLite file
//!
//! On top of the key-value layer, [`KvRecordStore`] keeps the full local
//! record baseline under the store's own key.

mod baseline;
mod error;
mod kv;
mod sqlite;

pub use baseline::{KvRecordStore, RecordStore};
pub use error::{StorageError, StorageResult};
pub use kv::{KeyValueStore, MemoryStore};
pub use sqlite::SqliteStore;

/// Reads a stored JSON array of field maps; an absent key reads as empty.
pub fn read_snapshots(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Vec<offsync_model::FieldMap>> {
    match store.get(key)? {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(Vec::new()),
    }
}

/// Writes a JSON array of field maps; an empty array removes the key.
pub fn write_snapshots(
    store: &dyn KeyValueStore,
    key: &str,
    snapshots: &[offsync_model::FieldMap],
) -> StorageResult<()> {
    if snapshots.is_empty() {
        return store.remove(key);
    }
    let raw = serde_json::to_string(snapshots)?;
    store.set(key, &raw)
}
