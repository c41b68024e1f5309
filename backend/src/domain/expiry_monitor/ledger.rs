//! Record of which thresholds have already been announced.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;
use uuid::Uuid;

use crate::domain::isolation::{ExpiryThreshold, IsolationRecord};

use super::WarningDedup;

/// In-memory alert ledger, optionally backed by the record's own markers.
#[derive(Debug)]
pub(super) struct AlertLedger {
    dedup: WarningDedup,
    announced: Mutex<HashSet<(Uuid, ExpiryThreshold)>>,
}

impl AlertLedger {
    pub(super) fn new(dedup: WarningDedup) -> Self {
        Self {
            dedup,
            announced: Mutex::default(),
        }
    }

    fn announced(&self) -> MutexGuard<'_, HashSet<(Uuid, ExpiryThreshold)>> {
        self.announced.lock().unwrap_or_else(|poisoned| {
            warn!("alert ledger mutex poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Claim `threshold` for `record`. Returns `false` if it was already
    /// announced, either by this monitor or (when durable) by a previous one.
    pub(super) fn claim(&self, record: &IsolationRecord, threshold: ExpiryThreshold) -> bool {
        if self.dedup == WarningDedup::Durable && record.was_alerted(threshold) {
            return false;
        }
        self.announced().insert((record.id(), threshold))
    }

    /// Forget records that are no longer isolated.
    ///
    /// Returns how many entries were dropped.
    pub(super) fn retain_isolated(&self, isolated: &HashSet<Uuid>) -> usize {
        let mut announced = self.announced();
        let before = announced.len();
        announced.retain(|(id, _)| isolated.contains(id));
        before - announced.len()
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.announced().len()
    }
}
