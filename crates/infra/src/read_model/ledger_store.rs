use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockledger_core::ItemId;
use stockledger_inventory::LedgerRow;

use super::StoreError;

/// Keyed persistence of ledger rows, one per item.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(&self, item_id: ItemId) -> Result<Option<LedgerRow>, StoreError>;

    /// Insert or fully replace the row for `row.item_id()`.
    async fn upsert(&self, row: &LedgerRow) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<LedgerRow>, StoreError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn get(&self, item_id: ItemId) -> Result<Option<LedgerRow>, StoreError> {
        (**self).get(item_id).await
    }

    async fn upsert(&self, row: &LedgerRow) -> Result<(), StoreError> {
        (**self).upsert(row).await
    }

    async fn list(&self) -> Result<Vec<LedgerRow>, StoreError> {
        (**self).list().await
    }
}

/// In-memory ledger store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<HashMap<ItemId, LedgerRow>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("ledger store lock poisoned".to_string())
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get(&self, item_id: ItemId) -> Result<Option<LedgerRow>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&item_id).cloned())
    }

    async fn upsert(&self, row: &LedgerRow) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(row.item_id(), row.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LedgerRow>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut rows: Vec<LedgerRow> = map.values().cloned().collect();
        rows.sort_by_key(|r| r.item_id());
        Ok(rows)
    }
}
