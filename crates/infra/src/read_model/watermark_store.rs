//! Watermark persistence.
//!
//! A single record: the last calendar day the incremental sync has fully
//! processed. The engine seeds it when absent and only ever moves it forward
//! through [`WatermarkStore::store`].

use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};

use stockledger_inventory::Watermark;

use super::{StoreError, map_sqlx_error};

#[async_trait::async_trait]
pub trait WatermarkStore: Send + Sync {
    /// `Ok(None)` when no watermark has been written yet.
    async fn load(&self) -> Result<Option<Watermark>, StoreError>;

    async fn store(&self, watermark: Watermark) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryWatermarkStore {
    inner: RwLock<Option<Watermark>>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(watermark: Watermark) -> Self {
        Self {
            inner: RwLock::new(Some(watermark)),
        }
    }
}

#[async_trait::async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn load(&self) -> Result<Option<Watermark>, StoreError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::Storage("watermark lock poisoned".to_string()))?;
        Ok(*guard)
    }

    async fn store(&self, watermark: Watermark) -> Result<(), StoreError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StoreError::Storage("watermark lock poisoned".to_string()))?;
        *guard = Some(watermark);
        Ok(())
    }
}

/// Postgres-backed watermark (singleton row `id = 1` in `sync_watermark`).
pub struct PostgresWatermarkStore {
    pool: Arc<PgPool>,
}

impl PostgresWatermarkStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl WatermarkStore for PostgresWatermarkStore {
    async fn load(&self) -> Result<Option<Watermark>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT last_processed, updated_at
            FROM sync_watermark
            WHERE id = 1
            "#,
        )
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_watermark", e))?;

        match row {
            Some(row) => {
                let last_processed: NaiveDate = row
                    .try_get("last_processed")
                    .map_err(|e| map_sqlx_error("load_watermark", e))?;
                let updated_at: DateTime<Utc> = row
                    .try_get("updated_at")
                    .map_err(|e| map_sqlx_error("load_watermark", e))?;
                Ok(Some(Watermark::new(last_processed, updated_at)))
            }
            None => Ok(None),
        }
    }

    async fn store(&self, watermark: Watermark) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sync_watermark (id, last_processed, updated_at)
            VALUES (1, $1, $2)
            ON CONFLICT (id)
            DO UPDATE SET
                last_processed = EXCLUDED.last_processed,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(watermark.last_processed)
        .bind(watermark.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("store_watermark", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_has_no_watermark_until_written() {
        let store = InMemoryWatermarkStore::new();
        assert!(store.load().await.unwrap().is_none());

        let wm = Watermark::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), Utc::now());
        store.store(wm).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(wm));
    }
}
