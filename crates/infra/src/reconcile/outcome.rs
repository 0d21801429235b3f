//! Results returned by the engine's entry points.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, Quantity, StoreCode};
use stockledger_inventory::{Item, LedgerRow};

/// Per-day tally of what happened to each event an incremental sync saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReport {
    pub day: NaiveDate,
    /// Events folded into a row and persisted.
    pub applied: u64,
    /// Events older than their row's current epoch.
    pub stale: u64,
    /// Events whose movement id was already applied for that store and day.
    pub duplicates: u64,
    pub unresolved: u64,
    pub malformed: u64,
    /// Events dated in the future and clamped to today (still applied).
    pub clamped: u64,
    /// Catalog lookups or ledger reads/writes that failed.
    pub storage_failures: u64,
    pub store_fetches: u64,
    pub store_failures: u64,
}

impl DayReport {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            ..Self::default()
        }
    }

    /// Every configured store answered for this day.
    pub fn is_complete(&self) -> bool {
        self.store_failures == 0
    }
}

/// Result of one incremental sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Set when a full reload was running and the invocation did nothing.
    pub skipped: bool,
    pub applied: u64,
    pub days: Vec<DayReport>,
    pub watermark_before: Option<NaiveDate>,
    pub watermark_after: Option<NaiveDate>,
    pub finished_at: DateTime<Utc>,
}

impl SyncOutcome {
    pub fn skipped(at: DateTime<Utc>) -> Self {
        Self {
            skipped: true,
            applied: 0,
            days: Vec::new(),
            watermark_before: None,
            watermark_after: None,
            finished_at: at,
        }
    }
}

/// Which stores a full reload covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadTarget {
    All,
    Store(StoreCode),
}

impl FromStr for ReloadTarget {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            StoreCode::new(s).map(Self::Store)
        }
    }
}

impl fmt::Display for ReloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadTarget::All => f.write_str("all"),
            ReloadTarget::Store(code) => write!(f, "{code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReloadReport {
    pub store: StoreCode,
    /// Every snapshot page was fetched.
    pub loaded: bool,
    pub entries: u64,
    pub overwritten: u64,
    pub unresolved: u64,
    pub storage_failures: u64,
    pub error: Option<String>,
}

impl StoreReloadReport {
    pub fn new(store: StoreCode) -> Self {
        Self {
            store,
            loaded: false,
            entries: 0,
            overwritten: 0,
            unresolved: 0,
            storage_failures: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadOutcome {
    pub target: ReloadTarget,
    pub anchor: NaiveDate,
    pub message: String,
    pub stores: Vec<StoreReloadReport>,
    /// Watermark after the reload, when it was moved.
    pub watermark: Option<NaiveDate>,
    /// Ledger as it stands after the reload.
    pub ledger: Vec<LedgerView>,
}

impl ReloadOutcome {
    pub fn is_partial(&self) -> bool {
        self.stores.iter().any(|s| !s.loaded)
    }
}

/// Read filter over the ledger projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    /// Only rows with a balance for this store.
    pub store: Option<StoreCode>,
    /// Case-insensitive category match.
    pub category: Option<String>,
    pub code: Option<String>,
    /// Hide rows whose current quantity (for `store`, or in total) is zero.
    #[serde(default)]
    pub non_zero: bool,
}

impl LedgerFilter {
    pub fn matches(&self, view: &LedgerView) -> bool {
        if let Some(code) = &self.code {
            if view.item.as_ref().map(|i| i.code.as_str()) != Some(code.as_str()) {
                return false;
            }
        }

        if let Some(category) = &self.category {
            let item_category = view.item.as_ref().and_then(|i| i.category.as_deref());
            if !item_category.is_some_and(|c| c.eq_ignore_ascii_case(category)) {
                return false;
            }
        }

        let current = match &self.store {
            Some(store) => match view.row.balances().get(store) {
                Some(balance) => balance.current,
                None => return false,
            },
            None => view.row.total_current(),
        };

        !(self.non_zero && current == Quantity::ZERO)
    }
}

/// A ledger row joined with its catalog item (absent if the item vanished).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerView {
    pub item: Option<Item>,
    pub row: LedgerRow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::ItemId;
    use stockledger_inventory::SyncPass;

    fn view(code: &str, category: Option<&str>, store: &str, units: i64) -> LedgerView {
        let id = ItemId::new();
        let mut item = Item::new(id, code, code);
        if let Some(c) = category {
            item = item.with_category(c);
        }
        let day = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let mut row = LedgerRow::seed(id, day);
        row.apply_movement(&StoreCode::new(store).unwrap(), day, Quantity::from_units(units), &mut SyncPass::default());
        LedgerView { item: Some(item), row }
    }

    #[test]
    fn reload_target_parses_all_or_a_store() {
        assert_eq!("ALL".parse::<ReloadTarget>().unwrap(), ReloadTarget::All);
        assert_eq!(
            "linhares".parse::<ReloadTarget>().unwrap(),
            ReloadTarget::Store(StoreCode::new("LINHARES").unwrap())
        );
        assert!("no such".parse::<ReloadTarget>().is_err());
    }

    #[test]
    fn filter_by_store_requires_a_balance_there() {
        let v = view("A1", None, "VITORIA", 3);
        let mut filter = LedgerFilter {
            store: Some(StoreCode::new("VITORIA").unwrap()),
            ..LedgerFilter::default()
        };
        assert!(filter.matches(&v));

        filter.store = Some(StoreCode::new("UNIAO").unwrap());
        assert!(!filter.matches(&v));
    }

    #[test]
    fn non_zero_and_category_filters() {
        let zero = view("Z1", Some("Tecidos"), "VITORIA", 0);
        let some = view("S1", Some("Tecidos"), "VITORIA", 2);

        let filter = LedgerFilter {
            category: Some("tecidos".to_string()),
            non_zero: true,
            ..LedgerFilter::default()
        };
        assert!(!filter.matches(&zero));
        assert!(filter.matches(&some));

        let by_code = LedgerFilter {
            code: Some("Z1".to_string()),
            ..LedgerFilter::default()
        };
        assert!(by_code.matches(&zero));
        assert!(!by_code.matches(&some));
    }
}
