use crate::error::{ModelError, ModelResult};
use offsync_types::Identity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record's fields, keyed by field name.
pub type FieldMap = serde_json::Map<String, Value>;

/// A record held in the local collection.
///
/// The identity is kept apart from `fields` and only injected when a
/// snapshot is taken, so renaming a record never touches its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    identity: Identity,
    fields: FieldMap,
    dirty: bool,
    phantom: bool,
}

impl Record {
    /// Creates a brand-new local record with a placeholder identity.
    /// The record starts dirty and phantom.
    pub fn new(fields: FieldMap) -> Self {
        Self::phantom(Identity::placeholder(), fields)
    }

    /// Creates a new local record under a caller-chosen placeholder.
    pub fn phantom(identity: Identity, fields: FieldMap) -> Self {
        Self {
            identity,
            fields,
            dirty: true,
            phantom: true,
        }
    }

    /// Creates a clean record the authority already knows about.
    pub fn committed(identity: Identity, fields: FieldMap) -> Self {
        Self {
            identity,
            fields,
            dirty: false,
            phantom: false,
        }
    }

    /// Rebuilds a clean record from a persisted snapshot.
    pub fn from_snapshot(snapshot: &FieldMap, id_property: &str) -> ModelResult<Self> {
        let mut fields = snapshot.clone();
        let identity = take_identity(&mut fields, id_property)?;
        Ok(Self::committed(identity, fields))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Looks up a value by JSON pointer (e.g., "/address/city").
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let path = pointer.strip_prefix('/')?;
        match path.split_once('/') {
            Some((head, rest)) => self.fields.get(head)?.pointer(&format!("/{rest}")),
            None => self.fields.get(path),
        }
    }

    /// Extract a string value using a JSON pointer.
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(|v| v.as_str())
    }

    /// Extract a boolean value using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.pointer(pointer).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.pointer(pointer).and_then(|v| v.as_f64())
    }

    /// Sets one field. The record only becomes dirty if the value changed.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if self.fields.get(&field) != Some(&value) {
            self.fields.insert(field, value);
            self.dirty = true;
        }
    }

    /// Sets every field in `fields`, leaving the others untouched.
    pub fn merge_fields(&mut self, fields: FieldMap) {
        for (field, value) in fields {
            self.set(field, value);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_phantom(&self) -> bool {
        self.phantom
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Flags the record as not yet created remotely.
    pub fn mark_phantom(&mut self) {
        self.phantom = true;
    }

    /// Marks the current state as persisted.
    pub fn commit(&mut self) {
        self.dirty = false;
    }

    /// Adopts the permanent identity handed out by the authority.
    pub fn assign_identity(&mut self, permanent: Identity) {
        self.identity = permanent;
        self.phantom = false;
    }

    /// Returns the field map with the identity injected under `id_property`.
    pub fn snapshot(&self, id_property: &str) -> FieldMap {
        let mut snapshot = self.fields.clone();
        snapshot.insert(id_property.to_string(), self.identity.to_value());
        snapshot
    }
}

/// Removes `property` from `fields` and parses it as an identity.
pub(crate) fn take_identity(fields: &mut FieldMap, property: &str) -> ModelResult<Identity> {
    let value = fields
        .remove(property)
        .ok_or_else(|| ModelError::MissingIdentity {
            property: property.to_string(),
        })?;
    Identity::from_value(&value).ok_or_else(|| ModelError::InvalidIdentity {
        property: property.to_string(),
        value,
    })
}
