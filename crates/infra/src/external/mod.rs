//! Collaborators outside the ledger: the movement and snapshot feeds of the
//! system of record, and the local item catalog.
//!
//! Each is an async trait so the engine can be driven by the HTTP client in
//! production and by scripted fakes in tests.

pub mod catalog;
pub mod omie;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::{Quantity, StoreCode};
use stockledger_inventory::{Item, MovementEvent};

pub use catalog::{InMemoryItemCatalog, PostgresItemCatalog};
pub use omie::OmieClient;

/// Errors raised while talking to the system of record.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("remote fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("no credentials configured for store {0}")]
    MissingCredentials(StoreCode),
}

/// One page of movement events for a store and day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPage {
    pub page: u32,
    pub total_pages: u32,
    pub events: Vec<MovementEvent>,
}

/// Point-in-time quantity of one item in one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub item_code: String,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPage {
    pub page: u32,
    pub total_pages: u32,
    pub entries: Vec<SnapshotEntry>,
}

/// Paged source of movement events.
#[async_trait::async_trait]
pub trait MovementFeed: Send + Sync {
    /// Fetch page `page` (1-based) of movements for `store` on `day`.
    async fn fetch_movements(
        &self,
        store: &StoreCode,
        day: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<MovementPage, FeedError>;
}

/// Paged source of per-store stock positions.
#[async_trait::async_trait]
pub trait SnapshotFeed: Send + Sync {
    async fn fetch_snapshot(
        &self,
        store: &StoreCode,
        position_date: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<SnapshotPage, FeedError>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog storage error: {0}")]
    Storage(String),
}

/// Maps external item codes to local items.
#[async_trait::async_trait]
pub trait ItemCatalog: Send + Sync {
    /// `Ok(None)` when the code is unknown locally.
    async fn resolve(&self, code: &str) -> Result<Option<Item>, CatalogError>;

    async fn list(&self) -> Result<Vec<Item>, CatalogError>;
}
