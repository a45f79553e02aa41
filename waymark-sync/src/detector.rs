//! Change detector: reconciles only when the source snapshot's fingerprint
//! moved since the last check.

use std::sync::Arc;

use parking_lot::Mutex;

use waymark_core::source::WaypointSource;

use crate::error::SyncError;
use crate::fingerprint::{fingerprint, Fingerprint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Unchanged,
    Changed {
        previous: Option<Fingerprint>,
        current: Fingerprint,
    },
    /// The fingerprint moved but the refresh failed. The stored fingerprint
    /// is left alone so the next tick retries.
    RefreshFailed {
        previous: Option<Fingerprint>,
        current: Fingerprint,
    },
    /// The snapshot could not be read. Treated as "no change".
    SourceUnavailable,
}

pub struct ChangeDetector {
    source: Arc<dyn WaypointSource>,
    previous: Mutex<Option<Fingerprint>>,
}

impl ChangeDetector {
    pub fn new(source: Arc<dyn WaypointSource>) -> Self {
        Self {
            source,
            previous: Mutex::new(None),
        }
    }

    /// Record the fingerprint of the current snapshot without triggering.
    /// Called once after the initial sync.
    pub fn prime(&self) -> Result<Fingerprint, SyncError> {
        let current = fingerprint(&self.source.all()?);
        *self.previous.lock() = Some(current);
        Ok(current)
    }

    pub fn previous(&self) -> Option<Fingerprint> {
        *self.previous.lock()
    }

    /// Read the snapshot and call `on_change` if its fingerprint differs from
    /// the last one committed. `on_change` reports whether the refresh
    /// succeeded; only then is the new fingerprint committed. A read error
    /// is logged and leaves the stored fingerprint untouched.
    pub fn tick(&self, on_change: impl FnOnce() -> bool) -> TickOutcome {
        let records = match self.source.all() {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("change check skipped, waystone source unreadable: {e}");
                return TickOutcome::SourceUnavailable;
            }
        };
        let current = fingerprint(&records);
        let previous = *self.previous.lock();
        if previous == Some(current) {
            return TickOutcome::Unchanged;
        }
        tracing::info!(
            "waystone data changed ({} → {current}, {} record(s)); refreshing markers",
            previous.map_or_else(|| "none".to_string(), |p| p.to_string()),
            records.len()
        );
        if !on_change() {
            tracing::warn!("refresh for {current} failed; retrying on the next check");
            return TickOutcome::RefreshFailed { previous, current };
        }
        *self.previous.lock() = Some(current);
        TickOutcome::Changed { previous, current }
    }
}
