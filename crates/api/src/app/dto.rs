use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::StoreCode;
use stockledger_infra::reconcile::{LedgerFilter, LedgerView, ReloadOutcome, StoreReloadReport, SyncOutcome};
use stockledger_inventory::Watermark;

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub store: Option<String>,
    pub category: Option<String>,
    pub code: Option<String>,
    #[serde(default)]
    pub non_zero: bool,
}

impl LedgerQuery {
    pub fn into_filter(self) -> Result<LedgerFilter, stockledger_core::DomainError> {
        let store = self.store.as_deref().map(StoreCode::new).transpose()?;
        Ok(LedgerFilter {
            store,
            category: self.category,
            code: self.code,
            non_zero: self.non_zero,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub current: f64,
    pub previous: f64,
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub item_id: String,
    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub current_epoch: NaiveDate,
    pub previous_epoch: NaiveDate,
    pub total_current: f64,
    pub total_previous: f64,
    pub balances: BTreeMap<String, BalanceResponse>,
}

impl From<&LedgerView> for LedgerEntryResponse {
    fn from(view: &LedgerView) -> Self {
        let row = &view.row;
        Self {
            item_id: row.item_id().to_string(),
            code: view.item.as_ref().map(|i| i.code.clone()),
            name: view.item.as_ref().map(|i| i.name.clone()),
            category: view.item.as_ref().and_then(|i| i.category.clone()),
            current_epoch: row.current_epoch(),
            previous_epoch: row.previous_epoch(),
            total_current: row.total_current().as_decimal(),
            total_previous: row.total_previous().as_decimal(),
            balances: row
                .balances()
                .iter()
                .map(|(store, b)| {
                    (
                        store.to_string(),
                        BalanceResponse {
                            current: b.current.as_decimal(),
                            previous: b.previous.as_decimal(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WatermarkResponse {
    pub last_processed: Option<NaiveDate>,
    pub updated_at: Option<DateTime<Utc>>,
    pub today: NaiveDate,
    pub reload_in_progress: bool,
    pub last_run: Option<SyncOutcome>,
}

impl WatermarkResponse {
    pub fn new(
        watermark: Option<Watermark>,
        today: NaiveDate,
        reload_in_progress: bool,
        last_run: Option<SyncOutcome>,
    ) -> Self {
        Self {
            last_processed: watermark.as_ref().map(|w| w.last_processed),
            updated_at: watermark.map(|w| w.updated_at),
            today,
            reload_in_progress,
            last_run,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub target: String,
    pub anchor: NaiveDate,
    pub message: String,
    pub partial: bool,
    pub watermark: Option<NaiveDate>,
    pub stores: Vec<StoreReloadReport>,
    pub ledger: Vec<LedgerEntryResponse>,
}

impl From<ReloadOutcome> for ReloadResponse {
    fn from(outcome: ReloadOutcome) -> Self {
        Self {
            target: outcome.target.to_string(),
            anchor: outcome.anchor,
            partial: outcome.is_partial(),
            ledger: outcome.ledger.iter().map(LedgerEntryResponse::from).collect(),
            message: outcome.message,
            watermark: outcome.watermark,
            stores: outcome.stores,
        }
    }
}
