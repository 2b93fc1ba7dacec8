//! Batch payloads exchanged with the remote authority.
//!
//! A flush sends one [`SyncBatch`] holding every pending kind. The
//! authority answers with a [`BatchResponse`] carrying an independent
//! outcome per kind, so a rejected update never blocks a confirmed create.
//!
//! Creates travel without the identity property. Their placeholder goes in
//! the client identity property instead and the authority echoes it back
//! next to the permanent identity it assigned.

use offsync_model::FieldMap;
use offsync_types::{Identity, Kind};
use serde::{Deserialize, Serialize};

/// Default name of the permanent identity property.
pub const DEFAULT_ID_PROPERTY: &str = "id";

/// Default name of the property carrying a placeholder to the authority.
pub const DEFAULT_CLIENT_ID_PROPERTY: &str = "clientId";

/// One flush worth of pending mutations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<FieldMap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<FieldMap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destroy: Vec<FieldMap>,
}

impl SyncBatch {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.destroy.is_empty()
    }

    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.destroy.len()
    }

    /// The payload for one kind.
    pub fn entries(&self, kind: Kind) -> &[FieldMap] {
        match kind {
            Kind::Created => &self.create,
            Kind::Updated => &self.update,
            Kind::Removed => &self.destroy,
        }
    }

    /// Kinds with at least one entry, in flush order.
    pub fn kinds(&self) -> Vec<Kind> {
        Kind::ALL
            .into_iter()
            .filter(|kind| !self.entries(*kind).is_empty())
            .collect()
    }
}

/// The authority's verdict on one kind of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KindOutcome {
    /// Applied. For creates, `records` carry the assigned identities.
    Confirmed { records: Vec<FieldMap> },
    /// Refused; the entries stay pending.
    Rejected { reason: String },
}

/// The authority's answer to a [`SyncBatch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<KindOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<KindOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destroy: Option<KindOutcome>,
}

impl BatchResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outcome for a kind.
    pub fn with_outcome(mut self, kind: Kind, outcome: KindOutcome) -> Self {
        *self.slot(kind) = Some(outcome);
        self
    }

    /// Confirms a kind with the given records.
    pub fn confirm(self, kind: Kind, records: Vec<FieldMap>) -> Self {
        self.with_outcome(kind, KindOutcome::Confirmed { records })
    }

    /// Rejects a kind.
    pub fn reject(self, kind: Kind, reason: impl Into<String>) -> Self {
        self.with_outcome(
            kind,
            KindOutcome::Rejected {
                reason: reason.into(),
            },
        )
    }

    /// The outcome reported for a kind, if any.
    pub fn outcome(&self, kind: Kind) -> Option<&KindOutcome> {
        match kind {
            Kind::Created => self.create.as_ref(),
            Kind::Updated => self.update.as_ref(),
            Kind::Removed => self.destroy.as_ref(),
        }
    }

    fn slot(&mut self, kind: Kind) -> &mut Option<KindOutcome> {
        match kind {
            Kind::Created => &mut self.create,
            Kind::Updated => &mut self.update,
            Kind::Removed => &mut self.destroy,
        }
    }
}

/// A placeholder and the permanent identity that replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityAssignment {
    pub placeholder: Identity,
    pub permanent: Identity,
}
