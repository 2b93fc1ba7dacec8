//! The change-tracking toggle.
//!
//! Tracking decides whether local commits are journaled. It can only be
//! switched off through [`ChangeTracking::suspend`], whose guard puts the
//! previous state back when dropped, so an early return or a `?` can never
//! leave tracking disabled.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Shared on/off switch for journaling local commits.
#[derive(Debug)]
pub struct ChangeTracking {
    enabled: AtomicBool,
}

impl ChangeTracking {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Disables tracking until the returned guard is dropped.
    #[must_use = "tracking is restored as soon as the guard is dropped"]
    pub fn suspend(&self) -> TrackingGuard<'_> {
        let previous = self.enabled.swap(false, Ordering::SeqCst);
        debug!("change tracking suspended (was {})", previous);
        TrackingGuard {
            tracking: self,
            previous,
        }
    }
}

impl Default for ChangeTracking {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Restores the tracking state captured by [`ChangeTracking::suspend`].
pub struct TrackingGuard<'a> {
    tracking: &'a ChangeTracking,
    previous: bool,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.tracking.enabled.store(self.previous, Ordering::SeqCst);
        debug!("change tracking restored to {}", self.previous);
    }
}
