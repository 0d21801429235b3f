//! Movement ids already applied, per (store, day), for this process lifetime.
//!
//! The open day is re-fetched on every trigger; this filter keeps the same
//! movement from being folded in twice. Events without an id pass through.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::NaiveDate;

use stockledger_core::StoreCode;

#[derive(Debug, Default)]
pub struct RedeliveryFilter {
    seen: Mutex<HashMap<(StoreCode, NaiveDate), HashSet<String>>>,
}

impl RedeliveryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, store: &StoreCode, day: NaiveDate, movement_id: &str) -> bool {
        self.seen
            .lock()
            .map(|seen| {
                seen.get(&(store.clone(), day))
                    .is_some_and(|ids| ids.contains(movement_id))
            })
            .unwrap_or(false)
    }

    pub fn record(&self, store: &StoreCode, day: NaiveDate, movement_id: &str) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.entry((store.clone(), day))
                .or_default()
                .insert(movement_id.to_string());
        }
    }

    /// Forget days that will not be fetched again.
    pub fn prune_before(&self, day: NaiveDate) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.retain(|(_, d), _| *d >= day);
        }
    }

    /// Forget everything recorded for `store`, so its movements apply again.
    pub fn forget_store(&self, store: &StoreCode) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.retain(|(s, _), _| s != store);
        }
    }

    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .map(|seen| seen.values().map(HashSet::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
