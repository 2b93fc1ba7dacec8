//! Placeholder to permanent identity remapping.

use crate::collection::RecordCollection;
use crate::protocol::{IdentityAssignment, DEFAULT_CLIENT_ID_PROPERTY, DEFAULT_ID_PROPERTY};
use offsync_model::FieldMap;
use offsync_types::Identity;
use tracing::{debug, warn};

/// Moves locally created records onto the identities the authority handed
/// out for them.
#[derive(Debug, Clone)]
pub struct IdentityRemapper {
    id_property: String,
    client_id_property: String,
}

impl IdentityRemapper {
    pub fn new(id_property: impl Into<String>, client_id_property: impl Into<String>) -> Self {
        Self {
            id_property: id_property.into(),
            client_id_property: client_id_property.into(),
        }
    }

    /// Extracts placeholder/permanent pairs from confirmed create records.
    ///
    /// Records missing either identity are skipped.
    pub fn assignments(&self, confirmed: &[FieldMap]) -> Vec<IdentityAssignment> {
        confirmed
            .iter()
            .filter_map(|fields| {
                let placeholder = fields
                    .get(&self.client_id_property)
                    .and_then(Identity::from_value);
                let permanent = fields.get(&self.id_property).and_then(Identity::from_value);
                match (placeholder, permanent) {
                    (Some(placeholder), Some(permanent)) => Some(IdentityAssignment {
                        placeholder,
                        permanent,
                    }),
                    _ => {
                        warn!(
                            "confirmed create lacks {} or {}, not remapped",
                            self.client_id_property, self.id_property
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Re-keys records in `collection`, returning the assignments applied.
    ///
    /// Placeholders no longer present locally are skipped.
    pub fn apply<C>(&self, collection: &mut C, assignments: &[IdentityAssignment]) -> Vec<IdentityAssignment>
    where
        C: RecordCollection + ?Sized,
    {
        let mut applied = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if collection.reassign(&assignment.placeholder, assignment.permanent.clone()) {
                debug!("{} is now {}", assignment.placeholder, assignment.permanent);
                applied.push(assignment.clone());
            } else {
                warn!(
                    "placeholder {} no longer exists locally, not remapped",
                    assignment.placeholder
                );
            }
        }
        applied
    }

    /// Derives and applies assignments in one step.
    pub fn remap<C>(&self, collection: &mut C, confirmed: &[FieldMap]) -> Vec<IdentityAssignment>
    where
        C: RecordCollection + ?Sized,
    {
        let assignments = self.assignments(confirmed);
        self.apply(collection, &assignments)
    }
}

impl Default for IdentityRemapper {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PROPERTY, DEFAULT_CLIENT_ID_PROPERTY)
    }
}
