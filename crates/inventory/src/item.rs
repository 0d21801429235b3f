use serde::{Deserialize, Serialize};

use stockledger_core::{ItemId, StoreCode};

/// Catalog item as known locally.
///
/// Maintained by catalog synchronization; read-only from the ledger's
/// perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// External code, unique in the system of record.
    pub code: String,
    pub name: String,
    /// Family / category label.
    pub category: Option<String>,
    /// Unit value in cents.
    pub unit_value: i64,
    /// Store the item was first registered from.
    pub origin_store: Option<StoreCode>,
}

impl Item {
    pub fn new(id: ItemId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            category: None,
            unit_value: 0,
            origin_store: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_origin_store(mut self, store: StoreCode) -> Self {
        self.origin_store = Some(store);
        self
    }

    pub fn with_unit_value(mut self, cents: i64) -> Self {
        self.unit_value = cents;
        self
    }
}

