//! Remote authority abstraction.
//!
//! The authority owns the canonical record set and hands out permanent
//! identities. How batches reach it (HTTP, RPC, a message queue) is up to
//! the implementation.

use crate::error::SyncResult;
use crate::protocol::{BatchResponse, SyncBatch};
use async_trait::async_trait;
use offsync_model::FieldMap;

/// The remote side of the sync.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Submits one batch as a single request.
    ///
    /// An `Err` means the authority could not be reached at all; per-kind
    /// refusals are reported inside the [`BatchResponse`].
    async fn submit(&self, batch: &SyncBatch) -> SyncResult<BatchResponse>;

    /// Fetches the full authoritative record set.
    async fn fetch_all(&self) -> SyncResult<Vec<FieldMap>>;
}

/// A scripted authority for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use crate::protocol::{DEFAULT_CLIENT_ID_PROPERTY, DEFAULT_ID_PROPERTY};
    use offsync_types::Kind;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    enum Scripted {
        Respond(BatchResponse),
        Unreachable(String),
    }

    /// Answers batches from a script, confirming everything once the script
    /// runs dry. Confirmed creates receive sequential numeric identities.
    pub struct MockAuthority {
        script: Mutex<VecDeque<Scripted>>,
        records: Mutex<Vec<FieldMap>>,
        fetch_error: Mutex<Option<String>>,
        submitted: Mutex<Vec<SyncBatch>>,
        submit_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        next_id: AtomicU64,
        gate: Option<Arc<Notify>>,
    }

    impl MockAuthority {
        pub fn new() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                records: Mutex::new(Vec::new()),
                fetch_error: Mutex::new(None),
                submitted: Mutex::new(Vec::new()),
                submit_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                gate: None,
            }
        }

        /// Creates an authority whose `submit` blocks until the returned
        /// [`Notify`] is signalled.
        pub fn gated() -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let authority = Self {
                gate: Some(gate.clone()),
                ..Self::new()
            };
            (authority, gate)
        }

        /// Sets the record set returned by `fetch_all`.
        pub fn with_records(self, records: Vec<FieldMap>) -> Self {
            *self.records.lock().unwrap() = records;
            self
        }

        /// Sets the first identity handed to confirmed creates.
        pub fn starting_id(self, id: u64) -> Self {
            self.next_id.store(id, Ordering::SeqCst);
            self
        }

        /// Queues the response for the next `submit`.
        pub fn push_response(&self, response: BatchResponse) {
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted::Respond(response));
        }

        /// Makes the next `submit` fail as unreachable.
        pub fn push_unreachable(&self, reason: impl Into<String>) {
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted::Unreachable(reason.into()));
        }

        /// Makes every `fetch_all` fail until cleared with `None`.
        pub fn set_fetch_error(&self, reason: Option<String>) {
            *self.fetch_error.lock().unwrap() = reason;
        }

        /// Every batch received so far.
        pub fn submitted(&self) -> Vec<SyncBatch> {
            self.submitted.lock().unwrap().clone()
        }

        /// Number of `submit` calls, counted on entry.
        pub fn submit_count(&self) -> usize {
            self.submit_calls.load(Ordering::SeqCst)
        }

        pub fn fetch_count(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        /// Confirms every kind present in `batch`.
        pub fn confirm_all(&self, batch: &SyncBatch) -> BatchResponse {
            let mut response = BatchResponse::new();
            for kind in batch.kinds() {
                let records = match kind {
                    Kind::Created => batch
                        .create
                        .iter()
                        .map(|fields| {
                            let mut record = fields.clone();
                            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                            record.insert(DEFAULT_ID_PROPERTY.to_string(), Value::from(id));
                            record
                        })
                        .collect(),
                    _ => batch.entries(kind).to_vec(),
                };
                response = response.confirm(kind, records);
            }
            response
        }

        /// The placeholder carried by a create payload.
        pub fn placeholder_of(fields: &FieldMap) -> Option<&str> {
            fields.get(DEFAULT_CLIENT_ID_PROPERTY).and_then(Value::as_str)
        }
    }

    impl Default for MockAuthority {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RemoteAuthority for MockAuthority {
        async fn submit(&self, batch: &SyncBatch) -> SyncResult<BatchResponse> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.submitted.lock().unwrap().push(batch.clone());
            let scripted = self.script.lock().unwrap().pop_front();
            match scripted {
                Some(Scripted::Respond(response)) => Ok(response),
                Some(Scripted::Unreachable(reason)) => Err(SyncError::RemoteUnreachable(reason)),
                None => Ok(self.confirm_all(batch)),
            }
        }

        async fn fetch_all(&self) -> SyncResult<Vec<FieldMap>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(reason) = self.fetch_error.lock().unwrap().clone() {
                return Err(SyncError::RemoteUnreachable(reason));
            }
            Ok(self.records.lock().unwrap().clone())
        }
    }
}
