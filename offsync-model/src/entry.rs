use crate::error::ModelResult;
use crate::record::{take_identity, FieldMap, Record};
use offsync_types::Identity;

/// A frozen copy of a record's fields, filed under one journal kind.
///
/// Entries are never edited in place; a newer snapshot of the same
/// identity replaces the old entry wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    identity: Identity,
    fields: FieldMap,
}

impl JournalEntry {
    pub fn new(identity: Identity, fields: FieldMap) -> Self {
        Self { identity, fields }
    }

    /// Snapshots a record's current state.
    pub fn from_record(record: &Record) -> Self {
        Self::new(record.identity().clone(), record.fields().clone())
    }

    /// Parses a persisted field map, pulling the identity out of `id_property`.
    pub fn from_snapshot(snapshot: &FieldMap, id_property: &str) -> ModelResult<Self> {
        let mut fields = snapshot.clone();
        let identity = take_identity(&mut fields, id_property)?;
        Ok(Self { identity, fields })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Returns the persisted form: the fields plus the identity under `id_property`.
    pub fn to_snapshot(&self, id_property: &str) -> FieldMap {
        let mut snapshot = self.fields.clone();
        snapshot.insert(id_property.to_string(), self.identity.to_value());
        snapshot
    }

    /// Consumes the entry, returning its identity and fields.
    pub fn into_parts(self) -> (Identity, FieldMap) {
        (self.identity, self.fields)
    }
}

impl From<&Record> for JournalEntry {
    fn from(record: &Record) -> Self {
        Self::from_record(record)
    }
}
