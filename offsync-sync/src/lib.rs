//! Offline change journal and two-stage sync engine.
//!
//! Records are edited locally and committed to a local baseline without any
//! connection to the remote authority. Each commit is also filed into a
//! per-kind journal that is flushed to the authority whenever one is
//! reachable.
//!
//! # Architecture
//!
//! Sync happens in two independent stages:
//!
//! 1. **Local persist**: a commit writes the baseline and the
//!    [`LocalSyncCoordinator`] reclassifies the committed changes into the
//!    [`ChangeJournal`], folding edits of unsent creates into their Created
//!    entry and cancelling creates that were removed before being sent.
//! 2. **Remote reconciliation**: the [`RemoteSyncCoordinator`] sends the
//!    journal as one [`SyncBatch`] and clears each kind the authority
//!    confirms. The [`IdentityRemapper`] then moves created records from
//!    their placeholder onto the permanent identity.
//!
//! The [`BootstrapReconciler`] loads state at startup, either from the local
//! baseline or wholesale from the authority.
//!
//! ## Components
//!
//! - **Journal**: pending mutations keyed by identity, persisted on every change
//! - **Local**: commit-time reclassification
//! - **Remote**: batch assembly, submission and per-kind settlement
//! - **Remap**: placeholder to permanent identity
//! - **Bootstrap**: startup loading with fallback
//! - **Store**: the [`OfflineStore`] facade tying it together
//!
//! # Example
//!
//! ```
//! use offsync_storage::MemoryStore;
//! use offsync_sync::authority::mock::MockAuthority;
//! use offsync_sync::{OfflineStore, StoreConfig};
//! use std::sync::Arc;
//!
//! let mut store = OfflineStore::new(
//!     StoreConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockAuthority::new()),
//! );
//!
//! let mut fields = serde_json::Map::new();
//! fields.insert("name".into(), "Ada".into());
//! let id = store.add(fields);
//! assert!(id.is_placeholder());
//!
//! store.commit_local().unwrap();
//! assert!(store.has_pending_created().unwrap());
//! ```

pub mod authority;
mod bootstrap;
mod collection;
mod error;
mod journal;
mod local;
pub mod protocol;
mod remap;
mod remote;
mod store;
mod tracking;

pub use authority::RemoteAuthority;
pub use bootstrap::{BootstrapOutcome, BootstrapReconciler};
pub use collection::{ChangeSet, RecordCollection, RecordSet};
pub use error::{SyncError, SyncResult};
pub use journal::ChangeJournal;
pub use local::LocalSyncCoordinator;
pub use protocol::{
    BatchResponse, IdentityAssignment, KindOutcome, SyncBatch, DEFAULT_CLIENT_ID_PROPERTY,
    DEFAULT_ID_PROPERTY,
};
pub use remap::IdentityRemapper;
pub use remote::{BeforeSync, FlushReport, FlushStatus, KindStatus, RemoteSyncCoordinator};
pub use store::{AutoServerSync, OfflineStore, ServerSyncReport, StoreConfig, SyncOutcome};
pub use tracking::{ChangeTracking, TrackingGuard};
