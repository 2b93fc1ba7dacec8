//! Record model for offsync.
//!
//! Defines the types every sync layer exchanges:
//! - [`Record`]: an in-memory entity with its identity and change flags
//! - [`FieldMap`]: the JSON object holding a record's fields
//! - [`JournalEntry`]: an immutable snapshot of a record filed in the journal
//!
//! On disk and on the wire a record is always a plain field map with its
//! identity injected under a configurable identity property.

mod entry;
mod error;
mod record;

pub use entry::JournalEntry;
pub use error::{ModelError, ModelResult};
pub use record::{FieldMap, Record};
