use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The journal partition a pending mutation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Created locally, never confirmed by the authority.
    Created,
    /// Changed locally after the authority last confirmed it.
    Updated,
    /// Removed locally, still to be destroyed remotely.
    Removed,
}

impl Kind {
    /// All kinds, in flush order.
    pub const ALL: [Kind; 3] = [Kind::Created, Kind::Updated, Kind::Removed];

    /// Storage key suffix for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Kind::Created => "created",
            Kind::Updated => "updated",
            Kind::Removed => "removed",
        }
    }

    /// Name of the batch operation carrying this kind on the wire.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Kind::Created => "create",
            Kind::Updated => "update",
            Kind::Removed => "destroy",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Kind::Created),
            "updated" => Ok(Kind::Updated),
            "removed" => Ok(Kind::Removed),
            other => Err(crate::Error::UnknownKind(other.to_string())),
        }
    }
}
