//! Local-persist stage: turns a local commit into journal updates.
//!
//! The three kinds overlap in ways the journal has to resolve:
//! - an update to a record still waiting to be created folds into its
//!   Created entry, since the authority has nothing to update yet
//! - removing a record still waiting to be created cancels the create and
//!   never reaches the authority
//! - removing a record with a pending update drops the update and files a
//!   delete instead

use crate::collection::ChangeSet;
use crate::error::SyncResult;
use crate::journal::{merge_entries, ChangeJournal};
use crate::tracking::ChangeTracking;
use offsync_model::{JournalEntry, Record};
use offsync_types::{Identity, Kind};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Reclassifies committed local changes into the journal.
pub struct LocalSyncCoordinator {
    journal: Arc<ChangeJournal>,
    tracking: Arc<ChangeTracking>,
}

impl LocalSyncCoordinator {
    pub fn new(journal: Arc<ChangeJournal>, tracking: Arc<ChangeTracking>) -> Self {
        Self { journal, tracking }
    }

    pub fn journal(&self) -> &Arc<ChangeJournal> {
        &self.journal
    }

    /// Journals one local commit.
    ///
    /// Returns false without touching the journal when tracking is off.
    pub fn on_commit(&self, changes: &ChangeSet) -> SyncResult<bool> {
        if !self.tracking.is_enabled() {
            debug!("tracking disabled, {} changes not journaled", changes.len());
            return Ok(false);
        }
        if !changes.added.is_empty() {
            self.on_created(&changes.added)?;
        }
        if !changes.updated.is_empty() {
            self.on_updated(&changes.updated)?;
        }
        if !changes.removed.is_empty() {
            self.on_removed(&changes.removed)?;
        }
        info!(
            "journaled commit: {} added, {} updated, {} removed",
            changes.added.len(),
            changes.updated.len(),
            changes.removed.len()
        );
        Ok(true)
    }

    /// Files newly added records under Created.
    ///
    /// A pending update for the same identity is dropped; the create already
    /// carries the latest snapshot.
    pub fn on_created(&self, added: &[Record]) -> SyncResult<()> {
        let entries = added.iter().map(JournalEntry::from_record).collect();
        self.journal.upsert(Kind::Created, entries, false)?;

        let mut updated = self.journal.read(Kind::Updated)?;
        let before = updated.len();
        updated.retain(|entry| !added.iter().any(|r| r.identity() == entry.identity()));
        if updated.len() != before {
            debug!("{} pending updates superseded by creates", before - updated.len());
            self.journal.upsert(Kind::Updated, updated, true)?;
        }
        Ok(())
    }

    /// Files updates, folding those of not-yet-created records into Created.
    pub fn on_updated(&self, updated: &[Record]) -> SyncResult<()> {
        let created = self.journal.read(Kind::Created)?;
        let pending_creates: HashSet<&Identity> =
            created.iter().map(JournalEntry::identity).collect();

        let (folded, genuine): (Vec<&Record>, Vec<&Record>) = updated
            .iter()
            .partition(|record| pending_creates.contains(record.identity()));

        if !folded.is_empty() {
            debug!("{} updates folded into pending creates", folded.len());
            let folded = folded.into_iter().map(JournalEntry::from_record).collect();
            let merged = merge_entries(created, folded);
            self.journal.upsert(Kind::Created, merged, true)?;
        }
        if !genuine.is_empty() {
            let genuine = genuine.into_iter().map(JournalEntry::from_record).collect();
            self.journal.upsert(Kind::Updated, genuine, false)?;
        }
        Ok(())
    }

    /// Files removals, cancelling pending creates and superseding pending
    /// updates.
    pub fn on_removed(&self, removed: &[Record]) -> SyncResult<()> {
        let mut created = self.journal.read(Kind::Created)?;
        let mut updated = self.journal.read(Kind::Updated)?;
        let (created_before, updated_before) = (created.len(), updated.len());
        let mut outgoing = Vec::new();

        for record in removed {
            let identity = record.identity();
            let was_created = take(&mut created, identity);
            let was_updated = take(&mut updated, identity);
            if was_created {
                debug!("removal of {} cancels its pending create", identity);
                continue;
            }
            if was_updated {
                debug!("removal of {} supersedes its pending update", identity);
            }
            outgoing.push(JournalEntry::from_record(record));
        }

        if created.len() != created_before {
            self.journal.upsert(Kind::Created, created, true)?;
        }
        if updated.len() != updated_before {
            self.journal.upsert(Kind::Updated, updated, true)?;
        }
        if !outgoing.is_empty() {
            self.journal.upsert(Kind::Removed, outgoing, false)?;
        }
        Ok(())
    }
}

/// Removes the entry for `identity`, reporting whether one was there.
fn take(entries: &mut Vec<JournalEntry>, identity: &Identity) -> bool {
    match entries.iter().position(|entry| entry.identity() == identity) {
        Some(index) => {
            entries.remove(index);
            true
        }
        None => false,
    }
}
