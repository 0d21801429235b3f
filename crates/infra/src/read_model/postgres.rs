//! Postgres-backed ledger store.
//!
//! One row per item in `ledger_rows`. Per-store balances are kept as a JSONB
//! object keyed by store code so adding a store needs no migration; totals and
//! epochs are plain columns so they can be filtered on.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::Span;

use stockledger_core::{ItemId, Quantity, StoreCode};
use stockledger_inventory::{Balance, LedgerRow};

use super::{LedgerStore, StoreError, map_sqlx_error};

pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const SELECT_ROW: &str = r#"
    SELECT item_id, current_epoch, previous_epoch, balances, total_current, total_previous
    FROM ledger_rows
"#;

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<LedgerRow, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_ledger_row", e);

    let item_id: uuid::Uuid = row.try_get("item_id").map_err(decode)?;
    let current_epoch: NaiveDate = row.try_get("current_epoch").map_err(decode)?;
    let previous_epoch: NaiveDate = row.try_get("previous_epoch").map_err(decode)?;
    let Json(balances): Json<BTreeMap<StoreCode, Balance>> = row.try_get("balances").map_err(decode)?;
    let total_current: i64 = row.try_get("total_current").map_err(decode)?;
    let total_previous: i64 = row.try_get("total_previous").map_err(decode)?;

    LedgerRow::restore(
        ItemId::from_uuid(item_id),
        current_epoch,
        previous_epoch,
        balances,
        Quantity::from_hundredths(total_current),
        Quantity::from_hundredths(total_previous),
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn get(&self, item_id: ItemId) -> Result<Option<LedgerRow>, StoreError> {
        Span::current().record("operation", "get_ledger_row");

        let row = sqlx::query(&format!("{SELECT_ROW} WHERE item_id = $1"))
            .bind(*item_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_ledger_row", e))?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn upsert(&self, row: &LedgerRow) -> Result<(), StoreError> {
        Span::current().record("operation", "upsert_ledger_row");

        sqlx::query(
            r#"
            INSERT INTO ledger_rows (
                item_id,
                current_epoch,
                previous_epoch,
                balances,
                total_current,
                total_previous
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (item_id)
            DO UPDATE SET
                current_epoch = EXCLUDED.current_epoch,
                previous_epoch = EXCLUDED.previous_epoch,
                balances = EXCLUDED.balances,
                total_current = EXCLUDED.total_current,
                total_previous = EXCLUDED.total_previous,
                updated_at = NOW()
            "#,
        )
        .bind(*row.item_id().as_uuid())
        .bind(row.current_epoch())
        .bind(row.previous_epoch())
        .bind(Json(row.balances()))
        .bind(row.total_current().hundredths())
        .bind(row.total_previous().hundredths())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_ledger_row", e))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<LedgerRow>, StoreError> {
        Span::current().record("operation", "list_ledger_rows");

        let rows = sqlx::query(&format!("{SELECT_ROW} ORDER BY item_id"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_ledger_rows", e))?;

        rows.iter().map(decode_row).collect()
    }
}
