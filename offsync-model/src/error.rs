use thiserror::Error;

/// Result type for model conversions.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when a field map cannot be turned into a record.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The identity property is absent.
    #[error("missing identity property {property:?}")]
    MissingIdentity { property: String },

    /// The identity property holds something that is not an identifier.
    #[error("invalid identity in property {property:?}: {value}")]
    InvalidIdentity {
        property: String,
        value: serde_json::Value,
    },
}
