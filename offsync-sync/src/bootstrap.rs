//! Loading local state, either from the baseline or wholesale from the
//! authority.
//!
//! A successful authority load wins over everything held locally: the
//! baseline is rewritten and the journal emptied, so edits not yet flushed
//! are lost. An unsuccessful one leaves both untouched and falls back to the
//! baseline.

use crate::authority::RemoteAuthority;
use crate::collection::{ChangeSet, RecordCollection};
use crate::error::{SyncError, SyncResult};
use crate::journal::ChangeJournal;
use crate::local::LocalSyncCoordinator;
use crate::tracking::ChangeTracking;
use offsync_model::Record;
use offsync_storage::RecordStore;
use offsync_types::{Identity, Kind};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How [`BootstrapReconciler::load_from_authority`] ended.
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// The authority's record set replaced local state.
    Loaded { count: usize },
    /// The authority load failed; the local baseline was loaded instead.
    FellBack { count: usize, cause: SyncError },
}

impl BootstrapOutcome {
    /// Number of records now in the collection.
    pub fn count(&self) -> usize {
        match self {
            BootstrapOutcome::Loaded { count } | BootstrapOutcome::FellBack { count, .. } => {
                *count
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, BootstrapOutcome::Loaded { .. })
    }
}

/// Populates a record collection at startup.
pub struct BootstrapReconciler {
    journal: Arc<ChangeJournal>,
    local: Arc<LocalSyncCoordinator>,
    baseline: Arc<dyn RecordStore>,
    authority: Arc<dyn RemoteAuthority>,
    tracking: Arc<ChangeTracking>,
    id_property: String,
}

impl BootstrapReconciler {
    pub fn new(
        journal: Arc<ChangeJournal>,
        local: Arc<LocalSyncCoordinator>,
        baseline: Arc<dyn RecordStore>,
        authority: Arc<dyn RemoteAuthority>,
        tracking: Arc<ChangeTracking>,
    ) -> Self {
        let id_property = journal.id_property().to_string();
        Self {
            journal,
            local,
            baseline,
            authority,
            tracking,
            id_property,
        }
    }

    /// Loads the local baseline into `collection`.
    ///
    /// Records still waiting in Created come back phantom. Returns the number
    /// of records loaded.
    pub fn load_local<C>(&self, collection: &mut C) -> SyncResult<usize>
    where
        C: RecordCollection + ?Sized,
    {
        let mut records = self.baseline.load_all()?;
        let pending: HashSet<Identity> = self
            .journal
            .read(Kind::Created)?
            .into_iter()
            .map(|entry| entry.into_parts().0)
            .collect();
        for record in &mut records {
            if pending.contains(record.identity()) {
                record.mark_phantom();
            }
        }
        let count = records.len();
        debug!("loaded {} records from baseline, {} phantom", count, pending.len());
        collection.replace_all(records);
        Ok(count)
    }

    /// Replaces local state with the authority's record set, falling back to
    /// the local baseline if it cannot be fetched.
    ///
    /// Persistence failures while adopting a fetched set are returned as
    /// errors; tracking is restored either way.
    pub async fn load_from_authority<C>(&self, collection: &mut C) -> SyncResult<BootstrapOutcome>
    where
        C: RecordCollection + ?Sized,
    {
        let records = match self.fetch().await {
            Ok(records) => records,
            Err(cause) => {
                warn!("authority load failed, using local baseline: {}", cause);
                let count = self.load_local(collection)?;
                return Ok(BootstrapOutcome::FellBack { count, cause });
            }
        };
        let count = self.adopt(collection, records)?;
        info!("loaded {} records from authority", count);
        Ok(BootstrapOutcome::Loaded { count })
    }

    async fn fetch(&self) -> SyncResult<Vec<Record>> {
        let fetched = self
            .authority
            .fetch_all()
            .await
            .map_err(|err| SyncError::Bootstrap(err.to_string()))?;
        fetched
            .iter()
            .map(|fields| {
                Record::from_snapshot(fields, &self.id_property)
                    .map_err(|err| SyncError::Bootstrap(err.to_string()))
            })
            .collect()
    }

    fn adopt<C>(&self, collection: &mut C, mut records: Vec<Record>) -> SyncResult<usize>
    where
        C: RecordCollection + ?Sized,
    {
        self.baseline.clear()?;
        for record in &mut records {
            record.mark_dirty();
        }
        {
            let _suspended = self.tracking.suspend();
            self.baseline.write(&records, &[])?;
            let changes = ChangeSet {
                updated: records.clone(),
                ..ChangeSet::default()
            };
            self.local.on_commit(&changes)?;
        }
        for record in &mut records {
            record.commit();
        }
        self.journal.clear_all()?;
        let count = records.len();
        collection.replace_all(records);
        Ok(count)
    }
}
