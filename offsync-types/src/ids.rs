//! Record identities.
//!
//! A record is born with a placeholder identity generated on the device and
//! keeps it until the remote authority confirms the create and hands back a
//! permanent one. Both forms are keyed by their string form; placeholders are
//! recognisable by their prefix. Authorities that hand out integer keys get
//! them back as JSON numbers.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// Prefix carried by every locally generated placeholder identity.
pub const PLACEHOLDER_PREFIX: &str = "local-";

/// Unique key of a record, either a placeholder or authority-assigned.
///
/// Equality, hashing and ordering look at the key only, so `42` and `"42"`
/// name the same record. The JSON form is kept for the wire.
#[derive(Debug, Clone)]
pub struct Identity {
    key: String,
    numeric: bool,
}

impl Identity {
    /// Wraps an existing string identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            key: value.into(),
            numeric: false,
        }
    }

    /// Wraps an integer key handed out by the authority.
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self {
            key: value.to_string(),
            numeric: true,
        }
    }

    /// Generates a fresh placeholder identity.
    /// Uses UUID v7 so placeholders sort in creation order.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new(format!("{PLACEHOLDER_PREFIX}{}", Uuid::now_v7()))
    }

    /// Returns true if this identity was generated locally.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        !self.numeric && self.key.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Returns true if the authority sent this identity as a JSON number.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Reads an identity out of a JSON field value.
    ///
    /// Authorities commonly hand out integer keys, so non-negative and
    /// negative integers are accepted alongside strings. Empty strings,
    /// floats and every other JSON type yield `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::new(s.clone())),
            Value::Number(n) if n.is_u64() || n.is_i64() => Some(Self {
                key: n.to_string(),
                numeric: true,
            }),
            _ => None,
        }
    }

    /// Converts the identity into the JSON value stored in field maps,
    /// as a number if it arrived as one.
    #[must_use]
    pub fn to_value(&self) -> Value {
        if self.numeric {
            if let Ok(n) = self.key.parse::<i64>() {
                return Value::from(n);
            }
            if let Ok(n) = self.key.parse::<u64>() {
                return Value::from(n);
            }
        }
        Value::String(self.key.clone())
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Self::new(s)),
            other => Self::from_value(&other).ok_or_else(|| {
                de::Error::custom(format!("expected a string or integer identity, got {other}"))
            }),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for Identity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(crate::Error::InvalidIdentity(s.to_string()));
        }
        Ok(Self::new(s))
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<u64> for Identity {
    fn from(value: u64) -> Self {
        Self {
            key: value.to_string(),
            numeric: true,
        }
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.key
    }
}
