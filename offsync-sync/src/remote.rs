//! Remote-reconciliation stage: flushes the journal to the authority.
//!
//! A flush reads all three kinds, claims them, builds one [`SyncBatch`] and
//! submits it. Every kind is then settled on its own: a confirmed kind is
//! cleared from the journal, a rejected one stays exactly as it was.

use crate::authority::RemoteAuthority;
use crate::error::{SyncError, SyncResult};
use crate::journal::ChangeJournal;
use crate::protocol::{
    BatchResponse, KindOutcome, SyncBatch, DEFAULT_CLIENT_ID_PROPERTY, DEFAULT_ID_PROPERTY,
};
use offsync_model::{FieldMap, JournalEntry};
use offsync_storage::StorageError;
use offsync_types::Kind;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Pre-submit hook. Returning false cancels the flush.
pub type BeforeSync = Arc<dyn Fn(&SyncBatch) -> bool + Send + Sync>;

/// What a flush ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    /// The journal was empty; nothing was sent.
    NothingPending,
    /// The before-sync hook cancelled the flush; nothing was sent.
    Vetoed,
    /// The batch reached the submit step.
    Submitted,
}

/// How one kind of a submitted batch was settled.
#[derive(Debug)]
pub enum KindStatus {
    /// Cleared from the journal. `records` are the authority's echo.
    Confirmed { records: Vec<FieldMap> },
    /// Left in the journal.
    Rejected(SyncError),
}

/// Result of [`RemoteSyncCoordinator::flush`].
#[derive(Debug)]
pub struct FlushReport {
    pub status: FlushStatus,
    pub outcomes: BTreeMap<Kind, KindStatus>,
}

impl FlushReport {
    fn idle(status: FlushStatus) -> Self {
        Self {
            status,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn is_confirmed(&self, kind: Kind) -> bool {
        matches!(self.outcomes.get(&kind), Some(KindStatus::Confirmed { .. }))
    }

    pub fn is_rejected(&self, kind: Kind) -> bool {
        matches!(self.outcomes.get(&kind), Some(KindStatus::Rejected(_)))
    }

    /// The records the authority returned for a confirmed kind.
    pub fn confirmed_records(&self, kind: Kind) -> &[FieldMap] {
        match self.outcomes.get(&kind) {
            Some(KindStatus::Confirmed { records }) => records,
            _ => &[],
        }
    }

    /// The failure recorded for a rejected kind.
    pub fn rejection(&self, kind: Kind) -> Option<&SyncError> {
        match self.outcomes.get(&kind) {
            Some(KindStatus::Rejected(cause)) => Some(cause),
            _ => None,
        }
    }

    /// Returns true if every submitted kind was confirmed.
    pub fn all_confirmed(&self) -> bool {
        self.outcomes
            .values()
            .all(|status| matches!(status, KindStatus::Confirmed { .. }))
    }
}

/// Drives flushes of the journal to the remote authority.
pub struct RemoteSyncCoordinator {
    journal: Arc<ChangeJournal>,
    authority: Arc<dyn RemoteAuthority>,
    in_flight: Mutex<HashSet<Kind>>,
    before_sync: Option<BeforeSync>,
    id_property: String,
    client_id_property: String,
}

impl RemoteSyncCoordinator {
    pub fn new(journal: Arc<ChangeJournal>, authority: Arc<dyn RemoteAuthority>) -> Self {
        Self {
            journal,
            authority,
            in_flight: Mutex::new(HashSet::new()),
            before_sync: None,
            id_property: DEFAULT_ID_PROPERTY.to_string(),
            client_id_property: DEFAULT_CLIENT_ID_PROPERTY.to_string(),
        }
    }

    /// Sets the field names used on the wire.
    pub fn with_properties(
        mut self,
        id_property: impl Into<String>,
        client_id_property: impl Into<String>,
    ) -> Self {
        self.id_property = id_property.into();
        self.client_id_property = client_id_property.into();
        self
    }

    /// Installs a hook consulted right before submitting.
    pub fn with_before_sync<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SyncBatch) -> bool + Send + Sync + 'static,
    {
        self.before_sync = Some(Arc::new(hook));
        self
    }

    pub fn journal(&self) -> &Arc<ChangeJournal> {
        &self.journal
    }

    pub fn client_id_property(&self) -> &str {
        &self.client_id_property
    }

    /// Kinds currently claimed by an outstanding flush.
    pub fn in_flight_kinds(&self) -> Vec<Kind> {
        let claimed = match self.in_flight.lock() {
            Ok(claimed) => claimed,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut kinds: Vec<Kind> = claimed.iter().copied().collect();
        drop(claimed);
        kinds.sort();
        kinds
    }

    /// Submits every pending journal entry as one batch.
    ///
    /// Fails with [`SyncError::ConcurrentFlush`] before doing anything if a
    /// flush covering any of the same kinds is still outstanding.
    ///
    /// A confirmed kind is cleared as a whole once the response arrives.
    /// Entries written to that kind while the submit is awaited are cleared
    /// with it. The journal is shared through an `Arc`, so callers that
    /// commit locally during a flush must wait for it to finish or resubmit
    /// those records. [`OfflineStore`](crate::OfflineStore) holds `&mut self`
    /// across the flush and never interleaves the two.
    pub async fn flush(&self) -> SyncResult<FlushReport> {
        let mut pending = BTreeMap::new();
        for kind in Kind::ALL {
            let entries = self.journal.read(kind)?;
            if !entries.is_empty() {
                pending.insert(kind, entries);
            }
        }
        if pending.is_empty() {
            debug!("flush skipped, journal empty");
            return Ok(FlushReport::idle(FlushStatus::NothingPending));
        }

        let kinds: Vec<Kind> = pending.keys().copied().collect();
        let _claim = self.claim(&kinds)?;

        let batch = self.build_batch(&pending);
        if let Some(hook) = &self.before_sync {
            if !hook(&batch) {
                info!("flush of {} entries vetoed", batch.len());
                return Ok(FlushReport::idle(FlushStatus::Vetoed));
            }
        }

        debug!("submitting {} entries for {:?}", batch.len(), kinds);
        let outcomes = match self.authority.submit(&batch).await {
            Ok(response) => self.settle(&kinds, response)?,
            Err(err) => {
                warn!("authority unreachable, {} kinds left pending: {}", kinds.len(), err);
                let reason = match err {
                    SyncError::RemoteUnreachable(reason) => reason,
                    other => other.to_string(),
                };
                kinds
                    .iter()
                    .map(|kind| {
                        (
                            *kind,
                            KindStatus::Rejected(SyncError::RemoteUnreachable(reason.clone())),
                        )
                    })
                    .collect()
            }
        };

        Ok(FlushReport {
            status: FlushStatus::Submitted,
            outcomes,
        })
    }

    /// Clears a confirmed kind from the journal, including entries added
    /// after the batch was built.
    pub fn on_kind_succeeded(&self, kind: Kind) -> SyncResult<()> {
        info!("authority confirmed {} batch", kind.operation());
        self.journal.clear(kind)
    }

    /// Leaves a rejected kind pending and reports why.
    pub fn on_kind_failed(&self, kind: Kind, cause: &SyncError) {
        warn!("{} batch not applied, entries kept: {}", kind.operation(), cause);
    }

    fn settle(
        &self,
        kinds: &[Kind],
        response: BatchResponse,
    ) -> SyncResult<BTreeMap<Kind, KindStatus>> {
        let mut outcomes = BTreeMap::new();
        for &kind in kinds {
            let status = match response.outcome(kind) {
                Some(KindOutcome::Confirmed { records }) => {
                    self.on_kind_succeeded(kind)?;
                    KindStatus::Confirmed {
                        records: records.clone(),
                    }
                }
                Some(KindOutcome::Rejected { reason }) => {
                    let cause = SyncError::RemoteRejected {
                        kind,
                        reason: reason.clone(),
                    };
                    self.on_kind_failed(kind, &cause);
                    KindStatus::Rejected(cause)
                }
                None => {
                    let cause = SyncError::RemoteRejected {
                        kind,
                        reason: "missing from response".to_string(),
                    };
                    self.on_kind_failed(kind, &cause);
                    KindStatus::Rejected(cause)
                }
            };
            outcomes.insert(kind, status);
        }
        Ok(outcomes)
    }

    fn build_batch(&self, pending: &BTreeMap<Kind, Vec<JournalEntry>>) -> SyncBatch {
        let mut batch = SyncBatch::default();
        for (kind, entries) in pending {
            match kind {
                Kind::Created => {
                    batch.create = entries
                        .iter()
                        .map(|entry| {
                            let mut fields = entry.fields().clone();
                            fields.remove(&self.id_property);
                            fields.insert(
                                self.client_id_property.clone(),
                                entry.identity().to_value(),
                            );
                            fields
                        })
                        .collect();
                }
                Kind::Updated => {
                    batch.update = self.snapshots(entries);
                }
                Kind::Removed => {
                    batch.destroy = self.snapshots(entries);
                }
            }
        }
        batch
    }

    fn snapshots(&self, entries: &[JournalEntry]) -> Vec<FieldMap> {
        entries
            .iter()
            .map(|entry| entry.to_snapshot(&self.id_property))
            .collect()
    }

    fn claim(&self, kinds: &[Kind]) -> SyncResult<FlightGuard<'_>> {
        let mut claimed = self
            .in_flight
            .lock()
            .map_err(|_| StorageError::Backend("in-flight set poisoned".into()))?;
        let mut overlap: Vec<Kind> = kinds
            .iter()
            .filter(|kind| claimed.contains(kind))
            .copied()
            .collect();
        if !overlap.is_empty() {
            overlap.sort();
            warn!("flush rejected, already in flight for {:?}", overlap);
            return Err(SyncError::ConcurrentFlush { kinds: overlap });
        }
        claimed.extend(kinds.iter().copied());
        Ok(FlightGuard {
            in_flight: &self.in_flight,
            kinds: kinds.to_vec(),
        })
    }
}

/// Releases claimed kinds when the flush ends, however it ends.
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<Kind>>,
    kinds: Vec<Kind>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut claimed = match self.in_flight.lock() {
            Ok(claimed) => claimed,
            Err(poisoned) => poisoned.into_inner(),
        };
        for kind in &self.kinds {
            claimed.remove(kind);
        }
    }
}
