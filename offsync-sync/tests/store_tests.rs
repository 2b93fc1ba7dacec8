mod common;

use common::{config, fields, init_tracing, make_store, named, names};
use offsync_storage::{KeyValueStore, KvRecordStore, MemoryStore, RecordStore, SqliteStore};
use offsync_sync::authority::mock::MockAuthority;
use offsync_sync::{
    AutoServerSync, BatchResponse, FlushStatus, OfflineStore, StoreConfig, SyncError,
};
use offsync_types::{Identity, Kind};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn manual() -> StoreConfig {
    StoreConfig {
        auto_server_sync: AutoServerSync::Never,
        ..config()
    }
}

// ── Configuration ────────────────────────────────────────────────

#[test]
fn default_config() {
    let config = StoreConfig::default();
    assert_eq!(config.store_id, "offsync-store");
    assert_eq!(config.id_property, "id");
    assert_eq!(config.client_id_property, "clientId");
    assert!(config.track_local_sync);
    assert!(config.auto_server_sync.should_sync());
}

#[test]
fn auto_server_sync_from_bool_and_predicate() {
    assert!(AutoServerSync::from(true).should_sync());
    assert!(!AutoServerSync::from(false).should_sync());

    let online = Arc::new(AtomicBool::new(false));
    let probe = online.clone();
    let auto = AutoServerSync::when(move || probe.load(Ordering::SeqCst));
    assert!(!auto.should_sync());
    online.store(true, Ordering::SeqCst);
    assert!(auto.should_sync());
    assert_eq!(format!("{auto:?}"), "When(..)");
}

// ── Editing ──────────────────────────────────────────────────────

#[test]
fn add_returns_placeholder_for_phantom_record() {
    init_tracing();
    let (mut store, _, _) = make_store(manual());

    let id = store.add(named("gamma"));

    assert!(id.is_placeholder());
    let record = store.get(&id).unwrap();
    assert!(record.is_phantom());
    assert!(record.is_dirty());
    assert_eq!(store.records().len(), 1);
}

#[test]
fn edits_of_unknown_record_fail() {
    init_tracing();
    let (mut store, _, _) = make_store(manual());
    let missing = Identity::new("nope");

    assert!(matches!(
        store.update(&missing, named("x")),
        Err(SyncError::RecordNotFound(_))
    ));
    assert!(matches!(
        store.set_field(&missing, "name", "x"),
        Err(SyncError::RecordNotFound(_))
    ));
    assert!(matches!(
        store.remove(&missing),
        Err(SyncError::RecordNotFound(_))
    ));
}

// ── Local commit ─────────────────────────────────────────────────

#[test]
fn commit_local_persists_baseline_and_journal() {
    init_tracing();
    let (mut store, kv, _) = make_store(manual());
    let id = store.add(named("gamma"));

    let committed = store.commit_local().unwrap();

    assert_eq!(committed.added.len(), 1);
    assert!(!store.get(&id).unwrap().is_dirty());
    assert!(store.has_pending_created().unwrap());
    assert!(!store.has_pending_updated().unwrap());
    assert!(!store.has_pending_removed().unwrap());
    assert!(store.has_pending_server_sync().unwrap());

    let baseline = KvRecordStore::new(kv, "test-store", "id");
    let stored = baseline.load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].identity(), &id);
}

#[test]
fn commit_without_changes_is_empty() {
    init_tracing();
    let (mut store, _, _) = make_store(manual());

    assert!(store.commit_local().unwrap().is_empty());
    assert!(!store.has_pending_server_sync().unwrap());
}

#[test]
fn untracked_store_persists_locally_only() {
    init_tracing();
    let (mut store, kv, authority) = make_store(StoreConfig {
        track_local_sync: false,
        ..config()
    });
    store.add(named("gamma"));

    assert!(!store.is_tracking());
    store.commit_local().unwrap();

    assert!(!store.has_pending_server_sync().unwrap());
    let baseline = KvRecordStore::new(kv, "test-store", "id");
    assert_eq!(baseline.load_all().unwrap().len(), 1);
    assert_eq!(authority.submit_count(), 0);
}

#[tokio::test]
async fn untracked_store_never_auto_flushes() {
    init_tracing();
    let (mut store, _, authority) = make_store(StoreConfig {
        track_local_sync: false,
        ..config()
    });
    store.add(named("gamma"));

    let outcome = store.sync().await.unwrap();

    assert!(outcome.server.is_none());
    assert_eq!(authority.submit_count(), 0);
}

// ── Server sync ──────────────────────────────────────────────────

#[tokio::test]
async fn sync_flushes_and_adopts_permanent_identity() {
    init_tracing();
    let (mut store, kv, authority) = make_store(config());
    let placeholder = store.add(named("gamma"));

    let outcome = store.sync().await.unwrap();

    let server = outcome.server.unwrap();
    assert_eq!(server.flush.status, FlushStatus::Submitted);
    assert_eq!(server.remapped.len(), 1);
    assert_eq!(server.remapped[0].placeholder, placeholder);
    assert_eq!(server.remapped[0].permanent, Identity::new("1"));

    assert!(store.get(&placeholder).is_none());
    let record = store.get(&Identity::new("1")).unwrap();
    assert!(!record.is_phantom());
    assert!(!store.has_pending_server_sync().unwrap());
    assert_eq!(authority.submit_count(), 1);

    let baseline = KvRecordStore::new(kv, "test-store", "id");
    let stored = baseline.load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].identity().as_str(), "1");
}

#[tokio::test]
async fn manual_store_waits_for_sync_server() {
    init_tracing();
    let (mut store, _, authority) = make_store(manual());
    store.add(named("gamma"));

    let outcome = store.sync().await.unwrap();
    assert!(outcome.server.is_none());
    assert_eq!(authority.submit_count(), 0);
    assert!(store.has_pending_created().unwrap());

    let report = store.sync_server().await.unwrap();
    assert!(report.flush.is_confirmed(Kind::Created));
    assert!(!store.has_pending_server_sync().unwrap());
}

#[tokio::test]
async fn predicate_gates_auto_flush() {
    init_tracing();
    let online = Arc::new(AtomicBool::new(false));
    let probe = online.clone();
    let (mut store, _, authority) = make_store(StoreConfig {
        auto_server_sync: AutoServerSync::when(move || probe.load(Ordering::SeqCst)),
        ..config()
    });
    store.add(named("gamma"));

    store.sync().await.unwrap();
    assert_eq!(authority.submit_count(), 0);

    online.store(true, Ordering::SeqCst);
    let outcome = store.sync().await.unwrap();
    assert!(outcome.committed.is_empty());
    assert!(outcome.server.is_some());
    assert_eq!(authority.submit_count(), 1);
}

#[tokio::test]
async fn update_and_remove_reach_authority_with_permanent_identity() {
    init_tracing();
    let (mut store, _, authority) = make_store(config());
    let placeholder = store.add(named("gamma"));
    store.sync().await.unwrap();
    assert!(store.get(&placeholder).is_none());
    let id = Identity::new("1");

    store.set_field(&id, "name", "gamma2").unwrap();
    store.sync().await.unwrap();
    store.remove(&id).unwrap();
    store.sync().await.unwrap();

    let batches = authority.submitted();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[1].update[0].get("id"), Some(&json!(1)));
    assert_eq!(batches[1].update[0].get("name"), Some(&json!("gamma2")));
    assert_eq!(batches[2].destroy[0].get("id"), Some(&json!(1)));
    assert!(store.records().is_empty());
    assert!(!store.has_pending_server_sync().unwrap());
}

#[tokio::test]
async fn integer_identity_goes_back_as_a_number() {
    init_tracing();
    let kv = Arc::new(MemoryStore::new());
    let authority = Arc::new(MockAuthority::new().starting_id(42));
    let mut store = OfflineStore::new(config(), kv.clone(), authority.clone());
    store.add(named("gamma"));
    store.sync().await.unwrap();

    let id = Identity::new("42");
    assert!(store.get(&id).unwrap().identity().is_numeric());
    store.set_field(&id, "name", "gamma2").unwrap();
    store.sync().await.unwrap();

    let batches = authority.submitted();
    assert_eq!(batches[1].update[0].get("id"), Some(&json!(42)));

    let raw = kv.get("test-store").unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored, json!([{ "id": 42, "name": "gamma2" }]));

    let mut reopened = OfflineStore::new(manual(), kv, authority);
    reopened.load_local().unwrap();
    assert!(reopened.get(&id).unwrap().identity().is_numeric());
}

#[tokio::test]
async fn removal_before_identity_arrives_destroys_permanent_record() {
    init_tracing();
    let (mut store, kv, authority) = make_store(manual());
    let placeholder = store.add(named("gamma"));
    store.commit_local().unwrap();
    store.remove(&placeholder).unwrap();

    let report = store.sync_server().await.unwrap();
    assert_eq!(report.remapped.len(), 1);
    assert_eq!(report.remapped[0].placeholder, placeholder);
    assert_eq!(report.remapped[0].permanent, Identity::new("1"));

    let committed = store.commit_local().unwrap();
    assert_eq!(committed.removed.len(), 1);
    assert_eq!(committed.removed[0].identity(), &Identity::new("1"));
    assert!(!committed.removed[0].is_phantom());
    store.sync_server().await.unwrap();

    let batches = authority.submitted();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].destroy.len(), 1);
    assert_eq!(batches[1].destroy[0].get("id"), Some(&json!(1)));
    assert!(!store.has_pending_server_sync().unwrap());
    assert!(store.records().is_empty());
    let baseline = KvRecordStore::new(kv, "test-store", "id");
    assert!(baseline.load_all().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_kind_stays_pending_for_next_sync() {
    init_tracing();
    let (mut store, _, authority) = make_store(config());
    store.add(named("gamma"));
    authority.push_response(BatchResponse::new().reject(Kind::Created, "quota exceeded"));

    let outcome = store.sync().await.unwrap();
    let server = outcome.server.unwrap();
    assert!(server.flush.is_rejected(Kind::Created));
    assert!(server.remapped.is_empty());
    assert!(store.has_pending_created().unwrap());

    let report = store.sync_server().await.unwrap();
    assert_eq!(report.remapped.len(), 1);
    assert!(!store.has_pending_server_sync().unwrap());
}

#[tokio::test]
async fn vetoed_sync_sends_nothing() {
    init_tracing();
    let kv = Arc::new(MemoryStore::new());
    let authority = Arc::new(MockAuthority::new());
    let mut store = OfflineStore::new(config(), kv, authority.clone())
        .with_before_sync(|_| false);
    store.add(named("gamma"));

    let outcome = store.sync().await.unwrap();

    assert_eq!(outcome.server.unwrap().flush.status, FlushStatus::Vetoed);
    assert_eq!(authority.submit_count(), 0);
    assert!(store.has_pending_created().unwrap());
}

// ── Loading ──────────────────────────────────────────────────────

#[tokio::test]
async fn load_server_replaces_local_state() {
    init_tracing();
    let kv = Arc::new(MemoryStore::new());
    let authority = Arc::new(MockAuthority::new().with_records(vec![
        fields(json!({ "id": 10, "name": "ten" })),
    ]));
    let mut store = OfflineStore::new(manual(), kv, authority);
    store.add(named("draft"));
    store.commit_local().unwrap();

    let outcome = store.load_server().await.unwrap();

    assert!(outcome.is_loaded());
    assert_eq!(names(store.records()), vec!["ten"]);
    assert!(!store.has_pending_server_sync().unwrap());
}

#[tokio::test]
async fn load_server_falls_back_when_offline() {
    init_tracing();
    let (mut store, _, authority) = make_store(manual());
    store.add(named("draft"));
    store.commit_local().unwrap();
    authority.set_fetch_error(Some("offline".into()));

    let outcome = store.load_server().await.unwrap();

    assert!(!outcome.is_loaded());
    assert_eq!(names(store.records()), vec!["draft"]);
    assert!(store.records()[0].is_phantom());
    assert!(store.has_pending_created().unwrap());
}

// ── Restart ──────────────────────────────────────────────────────

#[tokio::test]
async fn pending_work_survives_restart_on_sqlite() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let authority = Arc::new(MockAuthority::new().starting_id(42));

    let placeholder = {
        let kv = Arc::new(SqliteStore::open(&path).unwrap());
        let mut store = OfflineStore::new(manual(), kv, authority.clone());
        let id = store.add(named("gamma"));
        store.commit_local().unwrap();
        id
    };

    {
        let kv = Arc::new(SqliteStore::open(&path).unwrap());
        let mut store = OfflineStore::new(manual(), kv, authority.clone());
        assert_eq!(store.load_local().unwrap(), 1);
        assert!(store.get(&placeholder).unwrap().is_phantom());
        assert!(store.has_pending_created().unwrap());

        let report = store.sync_server().await.unwrap();
        assert_eq!(report.remapped[0].permanent, Identity::new("42"));
    }

    let kv = Arc::new(SqliteStore::open(&path).unwrap());
    let mut store = OfflineStore::new(manual(), kv, authority);
    store.load_local().unwrap();
    assert!(store.get(&placeholder).is_none());
    let record = store.get(&Identity::new("42")).unwrap();
    assert!(!record.is_phantom());
    assert!(!store.has_pending_server_sync().unwrap());
}
