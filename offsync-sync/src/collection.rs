//! In-memory record collection and per-commit change detection.

use offsync_model::{FieldMap, Record};
use offsync_types::Identity;

/// The operations the sync layer needs from a record collection.
pub trait RecordCollection {
    /// All records, in collection order.
    fn records(&self) -> &[Record];

    fn get(&self, identity: &Identity) -> Option<&Record>;

    fn add(&mut self, record: Record);

    /// Merges `fields` into the record. Returns false if it does not exist.
    fn update(&mut self, identity: &Identity, fields: FieldMap) -> bool;

    fn remove(&mut self, identity: &Identity) -> Option<Record>;

    /// Moves a record to a new identity and clears its phantom flag.
    /// A record removed since the last commit is moved too, so the removal
    /// reaches the authority under the new identity. Returns false if `from`
    /// is unknown.
    fn reassign(&mut self, from: &Identity, to: Identity) -> bool;

    /// Swaps the whole content for `records`, forgetting pending changes.
    fn replace_all(&mut self, records: Vec<Record>);
}

/// The outcome of one local commit: three disjoint record sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<Record>,
    pub updated: Vec<Record>,
    pub removed: Vec<Record>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Ordered record collection that remembers what changed since the last
/// commit.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
    /// Identities added since the last commit.
    added: Vec<Identity>,
    /// Committed records removed since the last commit, as they were.
    removed: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already-committed records.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Sets a single field on a record. Returns false if it does not exist.
    pub fn set_field(
        &mut self,
        identity: &Identity,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> bool {
        match self.position(identity) {
            Some(index) => {
                self.records[index].set(field, value);
                true
            }
            None => false,
        }
    }

    /// Computes what the next commit has to persist.
    ///
    /// `added` holds records created since the last commit, `updated` the
    /// other dirty records and `removed` committed records dropped since.
    pub fn changes(&self) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for record in &self.records {
            if self.added.contains(record.identity()) {
                changes.added.push(record.clone());
            } else if record.is_dirty() {
                changes.updated.push(record.clone());
            }
        }
        changes.removed = self.removed.clone();
        changes
    }

    /// Marks every record clean and forgets pending adds and removes.
    pub fn mark_committed(&mut self) {
        for record in &mut self.records {
            record.commit();
        }
        self.added.clear();
        self.removed.clear();
    }

    /// A committed record removed since the last commit.
    pub fn pending_removal(&self, identity: &Identity) -> Option<&Record> {
        self.removed.iter().find(|r| r.identity() == identity)
    }

    fn position(&self, identity: &Identity) -> Option<usize> {
        self.records.iter().position(|r| r.identity() == identity)
    }
}

impl RecordCollection for RecordSet {
    fn records(&self) -> &[Record] {
        &self.records
    }

    fn get(&self, identity: &Identity) -> Option<&Record> {
        self.records.iter().find(|r| r.identity() == identity)
    }

    fn add(&mut self, record: Record) {
        if let Some(index) = self.position(record.identity()) {
            self.records[index] = record;
            return;
        }
        // Re-adding a record removed in this commit cancels the removal.
        if let Some(index) = self
            .removed
            .iter()
            .position(|r| r.identity() == record.identity())
        {
            self.removed.remove(index);
            let mut record = record;
            record.mark_dirty();
            self.records.push(record);
            return;
        }
        self.added.push(record.identity().clone());
        self.records.push(record);
    }

    fn update(&mut self, identity: &Identity, fields: FieldMap) -> bool {
        match self.position(identity) {
            Some(index) => {
                self.records[index].merge_fields(fields);
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, identity: &Identity) -> Option<Record> {
        let index = self.position(identity)?;
        let record = self.records.remove(index);
        match self.added.iter().position(|id| id == identity) {
            // Never committed, nothing to tell the next commit.
            Some(pending) => {
                self.added.remove(pending);
            }
            None => self.removed.push(record.clone()),
        }
        Some(record)
    }

    fn reassign(&mut self, from: &Identity, to: Identity) -> bool {
        if let Some(index) = self.position(from) {
            if let Some(pending) = self.added.iter_mut().find(|id| **id == *from) {
                *pending = to.clone();
            }
            self.records[index].assign_identity(to);
            return true;
        }
        match self.removed.iter_mut().find(|r| r.identity() == from) {
            Some(record) => {
                record.assign_identity(to);
                true
            }
            None => false,
        }
    }

    fn replace_all(&mut self, records: Vec<Record>) {
        self.records = records;
        self.added.clear();
        self.removed.clear();
    }
}
