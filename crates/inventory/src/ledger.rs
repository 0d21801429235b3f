//! Two-epoch stock ledger.
//!
//! One [`LedgerRow`] per item holds, for every store dimension, the balance
//! for the row's current epoch (day D) and previous epoch (day D-1). Movement
//! events are folded in with a day-rollover state machine:
//!
//! - **New day** (`E > D`): every store's `current` shifts into `previous`,
//!   then the delta lands on the new `current`.
//! - **Same day** (`E == D`): the delta lands on `current`; the total is
//!   recomputed according to [`SameDayTotalPolicy`] for the first event of the
//!   pass and as a full sum afterwards.
//! - **Stale** (`E < D`): discarded, the row is never rolled backward.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ItemId, Quantity, StoreCode};

/// Balance of one store dimension across the two epochs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub current: Quantity,
    pub previous: Quantity,
}

/// How `total_current` is derived for the first same-day event of a pass.
///
/// `PreviousBaseline` reproduces the legacy rule: the previous epoch's total
/// adjusted by the event delta. `FreshSum` recomputes the total from every
/// store's current balance.
///
/// The default is `FreshSum`, which departs from the legacy rule so that
/// `total_current` always equals the sum of current balances. Totals can
/// differ from the legacy system's after the first same-day event of a pass;
/// select `previous-baseline` (`STOCKLEDGER_SAME_DAY_POLICY`) to match it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SameDayTotalPolicy {
    #[default]
    FreshSum,
    PreviousBaseline,
}

impl core::str::FromStr for SameDayTotalPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fresh-sum" | "fresh_sum" => Ok(Self::FreshSum),
            "previous-baseline" | "previous_baseline" => Ok(Self::PreviousBaseline),
            other => Err(DomainError::validation(format!(
                "unknown same-day total policy {other:?} (expected fresh-sum or previous-baseline)"
            ))),
        }
    }
}

/// Outcome of folding one movement into a row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Day boundary crossed; the row now represents `day`.
    Rollover { from: NaiveDate, to: NaiveDate },
    /// Delta applied within the row's current epoch.
    SameDay { first_in_pass: bool },
    /// Event older than the row's current epoch; nothing changed.
    Stale { row_epoch: NaiveDate },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        !matches!(self, Transition::Stale { .. })
    }
}

/// Per-invocation bookkeeping of which (item, day) pairs have been touched.
#[derive(Debug, Clone, Default)]
pub struct SyncPass {
    policy: SameDayTotalPolicy,
    seen: HashSet<(ItemId, NaiveDate)>,
}

impl SyncPass {
    pub fn new(policy: SameDayTotalPolicy) -> Self {
        Self {
            policy,
            seen: HashSet::new(),
        }
    }

    pub fn policy(&self) -> SameDayTotalPolicy {
        self.policy
    }

    pub fn has_seen(&self, item_id: ItemId, day: NaiveDate) -> bool {
        self.seen.contains(&(item_id, day))
    }

    /// Returns `true` when the pair had not been seen yet in this pass.
    fn mark_seen(&mut self, item_id: ItemId, day: NaiveDate) -> bool {
        self.seen.insert((item_id, day))
    }
}

/// Ledger row: per-store balances for one item over two consecutive days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    item_id: ItemId,
    current_epoch: NaiveDate,
    previous_epoch: NaiveDate,
    balances: BTreeMap<StoreCode, Balance>,
    total_current: Quantity,
    total_previous: Quantity,
}

impl LedgerRow {
    /// Fresh row representing `day` (and the day before), all balances zero.
    pub fn seed(item_id: ItemId, day: NaiveDate) -> Self {
        Self {
            item_id,
            current_epoch: day,
            previous_epoch: day_before(day),
            balances: BTreeMap::new(),
            total_current: Quantity::ZERO,
            total_previous: Quantity::ZERO,
        }
    }

    /// Rebuild a row from persisted parts.
    ///
    /// Totals are taken as stored (they may legitimately differ from the
    /// balance sums under [`SameDayTotalPolicy::PreviousBaseline`]).
    pub fn restore(
        item_id: ItemId,
        current_epoch: NaiveDate,
        previous_epoch: NaiveDate,
        balances: BTreeMap<StoreCode, Balance>,
        total_current: Quantity,
        total_previous: Quantity,
    ) -> DomainResult<Self> {
        if current_epoch < previous_epoch {
            return Err(DomainError::invariant(format!(
                "ledger row {item_id}: current epoch {current_epoch} precedes previous epoch {previous_epoch}"
            )));
        }
        Ok(Self {
            item_id,
            current_epoch,
            previous_epoch,
            balances,
            total_current,
            total_previous,
        })
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn current_epoch(&self) -> NaiveDate {
        self.current_epoch
    }

    pub fn previous_epoch(&self) -> NaiveDate {
        self.previous_epoch
    }

    pub fn balances(&self) -> &BTreeMap<StoreCode, Balance> {
        &self.balances
    }

    /// Balance for one store; zero when the store has never been touched.
    pub fn balance(&self, store: &StoreCode) -> Balance {
        self.balances.get(store).copied().unwrap_or_default()
    }

    pub fn total_current(&self) -> Quantity {
        self.total_current
    }

    pub fn total_previous(&self) -> Quantity {
        self.total_previous
    }

    pub fn sum_current(&self) -> Quantity {
        self.balances.values().map(|b| b.current).sum()
    }

    pub fn sum_previous(&self) -> Quantity {
        self.balances.values().map(|b| b.previous).sum()
    }

    /// Fold one movement delta for `store` on `day` into the row.
    pub fn apply_movement(
        &mut self,
        store: &StoreCode,
        day: NaiveDate,
        net: Quantity,
        pass: &mut SyncPass,
    ) -> Transition {
        use core::cmp::Ordering;

        match day.cmp(&self.current_epoch) {
            Ordering::Greater => {
                let from = self.current_epoch;
                for balance in self.balances.values_mut() {
                    balance.previous = balance.current;
                }
                self.total_previous = self.total_current;

                self.balances.entry(store.clone()).or_default().current += net;
                self.total_current = self.sum_current();

                self.previous_epoch = from;
                self.current_epoch = day;
                pass.mark_seen(self.item_id, day);

                Transition::Rollover { from, to: day }
            }
            Ordering::Equal => {
                self.balances.entry(store.clone()).or_default().current += net;

                let first_in_pass = pass.mark_seen(self.item_id, day);
                self.total_current = match (first_in_pass, pass.policy()) {
                    (true, SameDayTotalPolicy::PreviousBaseline) => self.total_previous + net,
                    _ => self.sum_current(),
                };

                Transition::SameDay { first_in_pass }
            }
            Ordering::Less => Transition::Stale {
                row_epoch: self.current_epoch,
            },
        }
    }

    /// Overwrite `store` with a point-in-time snapshot quantity anchored at `anchor`.
    ///
    /// Every store's `previous` is replicated from `current` and both epochs are
    /// reset to the anchor, discarding incremental state.
    pub fn overwrite_from_snapshot(&mut self, store: &StoreCode, quantity: Quantity, anchor: NaiveDate) {
        self.balances.entry(store.clone()).or_default().current = quantity;
        for balance in self.balances.values_mut() {
            balance.previous = balance.current;
        }

        self.current_epoch = anchor;
        self.previous_epoch = day_before(anchor);
        self.total_current = self.sum_current();
        self.total_previous = self.sum_previous();
    }
}

fn day_before(day: NaiveDate) -> NaiveDate {
    day.pred_opt().unwrap_or(day)
}
