//! Local item catalog.
//!
//! Catalog synchronization itself is out of scope here; these stores are read
//! by the engine and written by whatever keeps the catalog up to date (tests,
//! seed scripts, a future catalog sync job).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sqlx::{PgPool, Row};

use stockledger_core::{ItemId, StoreCode};
use stockledger_inventory::Item;

use super::{CatalogError, ItemCatalog};

/// In-memory catalog for tests/dev, keyed by item id with a code index.
#[derive(Debug, Default)]
pub struct InMemoryItemCatalog {
    inner: RwLock<CatalogMaps>,
}

#[derive(Debug, Default)]
struct CatalogMaps {
    by_id: HashMap<ItemId, Item>,
    by_code: HashMap<String, ItemId>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.upsert(item);
        }
        catalog
    }

    /// Insert or replace an item; the code index follows the latest value.
    pub fn upsert(&self, item: Item) {
        if let Ok(mut maps) = self.inner.write() {
            if let Some(old) = maps.by_id.get(&item.id) {
                let old_code = old.code.clone();
                maps.by_code.remove(&old_code);
            }
            maps.by_code.insert(item.code.clone(), item.id);
            maps.by_id.insert(item.id, item);
        }
    }
}

fn poisoned() -> CatalogError {
    CatalogError::Storage("catalog lock poisoned".to_string())
}

#[async_trait::async_trait]
impl ItemCatalog for InMemoryItemCatalog {
    async fn resolve(&self, code: &str) -> Result<Option<Item>, CatalogError> {
        let maps = self.inner.read().map_err(|_| poisoned())?;
        Ok(maps
            .by_code
            .get(code.trim())
            .and_then(|id| maps.by_id.get(id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Item>, CatalogError> {
        let maps = self.inner.read().map_err(|_| poisoned())?;
        let mut items: Vec<Item> = maps.by_id.values().cloned().collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(items)
    }
}

/// Catalog backed by the `items` table.
pub struct PostgresItemCatalog {
    pool: Arc<PgPool>,
}

impl PostgresItemCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn upsert(&self, item: &Item) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO items (item_id, code, name, category, unit_value, origin_store)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (item_id)
            DO UPDATE SET
                code = EXCLUDED.code,
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                unit_value = EXCLUDED.unit_value,
                origin_store = EXCLUDED.origin_store
            "#,
        )
        .bind(*item.id.as_uuid())
        .bind(&item.code)
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_value)
        .bind(item.origin_store.as_ref().map(|s| s.as_str().to_string()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_item", e))?;
        Ok(())
    }
}

const SELECT_ITEM: &str = "SELECT item_id, code, name, category, unit_value, origin_store FROM items";

fn row_to_item(row: &sqlx::postgres::PgRow) -> Result<Item, CatalogError> {
    let decode = |e: sqlx::Error| CatalogError::Storage(format!("failed to decode item row: {e}"));

    let id: uuid::Uuid = row.try_get("item_id").map_err(decode)?;
    let origin_store: Option<String> = row.try_get("origin_store").map_err(decode)?;

    Ok(Item {
        id: ItemId::from_uuid(id),
        code: row.try_get("code").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        unit_value: row.try_get("unit_value").map_err(decode)?,
        origin_store: origin_store.and_then(|s| StoreCode::new(s).ok()),
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    CatalogError::Storage(format!("sqlx error in {operation}: {err}"))
}

#[async_trait::async_trait]
impl ItemCatalog for PostgresItemCatalog {
    async fn resolve(&self, code: &str) -> Result<Option<Item>, CatalogError> {
        let row = sqlx::query(&format!("{SELECT_ITEM} WHERE code = $1"))
            .bind(code.trim())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("resolve_item", e))?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn list(&self) -> Result<Vec<Item>, CatalogError> {
        let rows = sqlx::query(&format!("{SELECT_ITEM} ORDER BY code"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;
        rows.iter().map(row_to_item).collect()
    }
}
