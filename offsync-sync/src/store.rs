//! The offline store: a record collection wired to the journal, the local
//! baseline and the remote authority.

use crate::authority::RemoteAuthority;
use crate::bootstrap::{BootstrapOutcome, BootstrapReconciler};
use crate::collection::{ChangeSet, RecordCollection, RecordSet};
use crate::error::{SyncError, SyncResult};
use crate::journal::ChangeJournal;
use crate::local::LocalSyncCoordinator;
use crate::protocol::{IdentityAssignment, SyncBatch, DEFAULT_CLIENT_ID_PROPERTY, DEFAULT_ID_PROPERTY};
use crate::remap::IdentityRemapper;
use crate::remote::{FlushReport, RemoteSyncCoordinator};
use crate::tracking::ChangeTracking;
use offsync_model::{FieldMap, Record};
use offsync_storage::{KeyValueStore, KvRecordStore, RecordStore};
use offsync_types::{Identity, Kind};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// When [`OfflineStore::sync`] should follow a local commit with a flush.
#[derive(Clone, Default)]
pub enum AutoServerSync {
    Never,
    #[default]
    Always,
    /// Flush only when the predicate holds, e.g. a connectivity probe.
    When(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl AutoServerSync {
    /// Wraps a predicate.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        AutoServerSync::When(Arc::new(predicate))
    }

    pub fn should_sync(&self) -> bool {
        match self {
            AutoServerSync::Never => false,
            AutoServerSync::Always => true,
            AutoServerSync::When(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for AutoServerSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoServerSync::Never => f.write_str("Never"),
            AutoServerSync::Always => f.write_str("Always"),
            AutoServerSync::When(_) => f.write_str("When(..)"),
        }
    }
}

impl From<bool> for AutoServerSync {
    fn from(enabled: bool) -> Self {
        if enabled {
            AutoServerSync::Always
        } else {
            AutoServerSync::Never
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Namespace for every persistence key the store writes.
    pub store_id: String,
    /// Field carrying the permanent identity.
    pub id_property: String,
    /// Field carrying a placeholder on creates.
    pub client_id_property: String,
    /// Whether local commits are journaled for the authority.
    pub track_local_sync: bool,
    pub auto_server_sync: AutoServerSync,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_id: "offsync-store".to_string(),
            id_property: DEFAULT_ID_PROPERTY.to_string(),
            client_id_property: DEFAULT_CLIENT_ID_PROPERTY.to_string(),
            track_local_sync: true,
            auto_server_sync: AutoServerSync::Always,
        }
    }
}

/// Result of a server sync: the flush and the identities it re-keyed.
#[derive(Debug)]
pub struct ServerSyncReport {
    pub flush: FlushReport,
    pub remapped: Vec<IdentityAssignment>,
}

/// Result of [`OfflineStore::sync`].
#[derive(Debug)]
pub struct SyncOutcome {
    /// What the local commit persisted.
    pub committed: ChangeSet,
    /// Present when the commit was followed by a server sync.
    pub server: Option<ServerSyncReport>,
}

/// A record collection that works offline and syncs on demand.
pub struct OfflineStore {
    config: StoreConfig,
    records: RecordSet,
    journal: Arc<ChangeJournal>,
    tracking: Arc<ChangeTracking>,
    baseline: Arc<dyn RecordStore>,
    local: Arc<LocalSyncCoordinator>,
    remote: RemoteSyncCoordinator,
    remapper: IdentityRemapper,
    bootstrap: BootstrapReconciler,
}

impl OfflineStore {
    /// Creates a store keeping both its baseline and its journal in `kv`.
    pub fn new(
        config: StoreConfig,
        kv: Arc<dyn KeyValueStore>,
        authority: Arc<dyn RemoteAuthority>,
    ) -> Self {
        let baseline = Arc::new(KvRecordStore::new(
            kv.clone(),
            config.store_id.clone(),
            config.id_property.clone(),
        ));
        Self::with_baseline(config, kv, baseline, authority)
    }

    /// Creates a store with a separate baseline backend.
    pub fn with_baseline(
        config: StoreConfig,
        kv: Arc<dyn KeyValueStore>,
        baseline: Arc<dyn RecordStore>,
        authority: Arc<dyn RemoteAuthority>,
    ) -> Self {
        let journal = Arc::new(ChangeJournal::new(
            kv,
            config.store_id.clone(),
            config.id_property.clone(),
        ));
        let tracking = Arc::new(ChangeTracking::new(config.track_local_sync));
        let local = Arc::new(LocalSyncCoordinator::new(journal.clone(), tracking.clone()));
        let remote = RemoteSyncCoordinator::new(journal.clone(), authority.clone())
            .with_properties(&config.id_property, &config.client_id_property);
        let remapper = IdentityRemapper::new(&config.id_property, &config.client_id_property);
        let bootstrap = BootstrapReconciler::new(
            journal.clone(),
            local.clone(),
            baseline.clone(),
            authority,
            tracking.clone(),
        );
        Self {
            config,
            records: RecordSet::new(),
            journal,
            tracking,
            baseline,
            local,
            remote,
            remapper,
            bootstrap,
        }
    }

    /// Installs a hook that can cancel a flush right before it is sent.
    pub fn with_before_sync<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncBatch) -> bool + Send + Sync + 'static,
    {
        self.remote = self.remote.with_before_sync(hook);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn journal(&self) -> &Arc<ChangeJournal> {
        &self.journal
    }

    pub fn tracking(&self) -> &Arc<ChangeTracking> {
        &self.tracking
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_enabled()
    }

    // ── Editing ──────────────────────────────────────────────────

    /// Adds a new record under a fresh placeholder and returns it.
    pub fn add(&mut self, fields: FieldMap) -> Identity {
        let record = Record::new(fields);
        let identity = record.identity().clone();
        self.records.add(record);
        identity
    }

    /// Merges `fields` into an existing record.
    pub fn update(&mut self, identity: &Identity, fields: FieldMap) -> SyncResult<()> {
        if self.records.update(identity, fields) {
            Ok(())
        } else {
            Err(SyncError::RecordNotFound(identity.clone()))
        }
    }

    pub fn set_field(
        &mut self,
        identity: &Identity,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> SyncResult<()> {
        if self.records.set_field(identity, field, value) {
            Ok(())
        } else {
            Err(SyncError::RecordNotFound(identity.clone()))
        }
    }

    pub fn remove(&mut self, identity: &Identity) -> SyncResult<Record> {
        self.records
            .remove(identity)
            .ok_or_else(|| SyncError::RecordNotFound(identity.clone()))
    }

    pub fn get(&self, identity: &Identity) -> Option<&Record> {
        self.records.get(identity)
    }

    pub fn records(&self) -> &[Record] {
        self.records.records()
    }

    // ── Syncing ──────────────────────────────────────────────────

    /// Persists pending edits to the baseline and journals them.
    pub fn commit_local(&mut self) -> SyncResult<ChangeSet> {
        let changes = self.records.changes();
        if changes.is_empty() {
            return Ok(changes);
        }
        let upserts: Vec<Record> = changes
            .added
            .iter()
            .chain(changes.updated.iter())
            .cloned()
            .collect();
        let removals: Vec<Identity> = changes
            .removed
            .iter()
            .map(|record| record.identity().clone())
            .collect();
        self.baseline.write(&upserts, &removals)?;
        self.local.on_commit(&changes)?;
        self.records.mark_committed();
        debug!("local commit persisted {} changes", changes.len());
        Ok(changes)
    }

    /// Commits locally, then syncs with the authority if configured to.
    pub async fn sync(&mut self) -> SyncResult<SyncOutcome> {
        let committed = self.commit_local()?;
        let server = if self.is_tracking() && self.config.auto_server_sync.should_sync() {
            Some(self.sync_server().await?)
        } else {
            None
        };
        Ok(SyncOutcome { committed, server })
    }

    /// Flushes the journal and adopts any identities the authority assigned.
    pub async fn sync_server(&mut self) -> SyncResult<ServerSyncReport> {
        let flush = self.remote.flush().await?;
        let confirmed = flush.confirmed_records(Kind::Created);
        let remapped = if confirmed.is_empty() {
            Vec::new()
        } else {
            self.remapper.remap(&mut self.records, confirmed)
        };
        for assignment in &remapped {
            let record = self
                .records
                .get(&assignment.permanent)
                .or_else(|| self.records.pending_removal(&assignment.permanent));
            if let Some(record) = record {
                self.baseline.replace(&assignment.placeholder, record)?;
            }
        }
        if !remapped.is_empty() {
            info!("{} records received permanent identities", remapped.len());
        }
        Ok(ServerSyncReport { flush, remapped })
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Loads the local baseline, replacing whatever is in memory.
    pub fn load_local(&mut self) -> SyncResult<usize> {
        self.bootstrap.load_local(&mut self.records)
    }

    /// Loads from the authority, falling back to the local baseline.
    pub async fn load_server(&mut self) -> SyncResult<BootstrapOutcome> {
        self.bootstrap.load_from_authority(&mut self.records).await
    }

    // ── Pending state ────────────────────────────────────────────

    pub fn has_pending_server_sync(&self) -> SyncResult<bool> {
        self.journal.has_pending_any()
    }

    pub fn has_pending_created(&self) -> SyncResult<bool> {
        self.journal.has_pending(Kind::Created)
    }

    pub fn has_pending_updated(&self) -> SyncResult<bool> {
        self.journal.has_pending(Kind::Updated)
    }

    pub fn has_pending_removed(&self) -> SyncResult<bool> {
        self.journal.has_pending(Kind::Removed)
    }
}
