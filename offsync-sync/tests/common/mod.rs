//! Shared test helpers for sync tests.

#![allow(dead_code)]

use offsync_model::{FieldMap, Record};
use offsync_storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
use offsync_sync::authority::mock::MockAuthority;
use offsync_sync::{
    ChangeJournal, ChangeTracking, LocalSyncCoordinator, OfflineStore, StoreConfig,
};
use offsync_types::Identity;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Builds a field map from a JSON object literal.
pub fn fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn named(name: &str) -> FieldMap {
    fields(json!({ "name": name }))
}

pub fn committed(id: &str, name: &str) -> Record {
    Record::committed(Identity::new(id), named(name))
}

pub fn make_journal(kv: Arc<dyn KeyValueStore>) -> Arc<ChangeJournal> {
    Arc::new(ChangeJournal::new(kv, "test-store", "id"))
}

pub fn make_local(journal: Arc<ChangeJournal>) -> (LocalSyncCoordinator, Arc<ChangeTracking>) {
    let tracking = Arc::new(ChangeTracking::default());
    (LocalSyncCoordinator::new(journal, tracking.clone()), tracking)
}

pub fn config() -> StoreConfig {
    StoreConfig {
        store_id: "test-store".to_string(),
        ..StoreConfig::default()
    }
}

/// Store over fresh in-memory persistence.
pub fn make_store(config: StoreConfig) -> (OfflineStore, Arc<MemoryStore>, Arc<MockAuthority>) {
    let kv = Arc::new(MemoryStore::new());
    let authority = Arc::new(MockAuthority::new());
    let store = OfflineStore::new(config, kv.clone(), authority.clone());
    (store, kv, authority)
}

/// Names of the records in a slice, in order.
pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get_str("/name").unwrap_or_default().to_string())
        .collect()
}

/// Key-value store whose writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.remove(key)
    }
}
