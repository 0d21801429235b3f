//! Persistent state of the reconciliation: ledger rows and the watermark.

pub mod ledger_store;
pub mod postgres;
pub mod watermark_store;

use thiserror::Error;

pub use ledger_store::{InMemoryLedgerStore, LedgerStore};
pub use postgres::PostgresLedgerStore;
pub use watermark_store::{InMemoryWatermarkStore, PostgresWatermarkStore, WatermarkStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    /// A persisted record could not be turned back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => StoreError::Storage(format!("connection pool closed in {operation}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("failed to decode row in {operation}: {err}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
