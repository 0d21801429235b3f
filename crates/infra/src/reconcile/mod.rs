//! Reconciliation engine: full reload and incremental sync over the ledger.

pub mod engine;
pub mod guard;
pub mod outcome;
pub mod redelivery;

use thiserror::Error;

use stockledger_core::StoreCode;

use crate::external::CatalogError;
use crate::read_model::StoreError;

pub use engine::{Collaborators, EngineSettings, ReconciliationEngine};
pub use guard::{ReloadFlag, ReloadGuard};
pub use outcome::{
    DayReport, LedgerFilter, LedgerView, ReloadOutcome, ReloadTarget, StoreReloadReport, SyncOutcome,
};
pub use redelivery::RedeliveryFilter;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("a full reload is already in progress")]
    ReloadInProgress,

    #[error("store {0} is not configured")]
    UnknownStore(StoreCode),

    #[error("watermark unavailable: {0}")]
    Watermark(#[source] StoreError),

    /// Every feed request of the invocation failed; nothing was processed.
    #[error("movement feed unavailable: {failures} of {attempts} store fetches failed")]
    FeedUnavailable { attempts: u64, failures: u64 },

    #[error("ledger unavailable: {0}")]
    Ledger(#[source] StoreError),

    #[error("catalog unavailable: {0}")]
    Catalog(#[source] CatalogError),
}
