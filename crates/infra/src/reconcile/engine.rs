//! The reconciliation engine.
//!
//! Two entry points mutate the ledger:
//! - [`ReconciliationEngine::full_reload`] overwrites rows from point-in-time
//!   snapshots and re-anchors the watermark,
//! - [`ReconciliationEngine::incremental_sync`] walks a bounded window of days
//!   after the watermark and folds movement events into rows.
//!
//! Work inside one invocation is sequential. Per-event failures are counted
//! and logged, never propagated. A day is applied only once every store has
//! answered for it; a failed fetch defers the whole day to the next invocation
//! and the watermark stops short of it. Only watermark access (and a feed that
//! failed every request) fails an invocation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Days, FixedOffset, NaiveDate, Offset, Utc};
use tracing::instrument;

use stockledger_core::{ItemId, StoreCode};
use stockledger_inventory::{
    DayCursor, LedgerRow, MovementEvent, SameDayTotalPolicy, SyncPass, Transition, Watermark,
};

use super::guard::ReloadFlag;
use super::outcome::{
    DayReport, LedgerFilter, LedgerView, ReloadOutcome, ReloadTarget, StoreReloadReport, SyncOutcome,
};
use super::redelivery::RedeliveryFilter;
use super::ReconcileError;
use crate::clock::Clock;
use crate::external::{FeedError, ItemCatalog, MovementFeed, SnapshotFeed};
use crate::read_model::{LedgerStore, WatermarkStore};

/// Tunables for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub stores: Vec<StoreCode>,
    pub movement_page_size: u32,
    pub snapshot_page_size: u32,
    pub max_days_per_run: u32,
    pub watermark_seed_days: u32,
    pub reload_anchor_days: u32,
    /// Offset of the business day relative to UTC.
    pub utc_offset: FixedOffset,
    pub same_day_policy: SameDayTotalPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stores: Vec::new(),
            movement_page_size: 1000,
            snapshot_page_size: 500,
            max_days_per_run: 3,
            watermark_seed_days: 10,
            reload_anchor_days: 10,
            utc_offset: Utc.fix(),
            same_day_policy: SameDayTotalPolicy::default(),
        }
    }
}

/// Everything the engine reads from or writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerStore>,
    pub watermarks: Arc<dyn WatermarkStore>,
    pub movements: Arc<dyn MovementFeed>,
    pub snapshots: Arc<dyn SnapshotFeed>,
    pub catalog: Arc<dyn ItemCatalog>,
    pub clock: Arc<dyn Clock>,
}

pub struct ReconciliationEngine {
    settings: EngineSettings,
    ledger: Arc<dyn LedgerStore>,
    watermarks: Arc<dyn WatermarkStore>,
    movements: Arc<dyn MovementFeed>,
    snapshots: Arc<dyn SnapshotFeed>,
    catalog: Arc<dyn ItemCatalog>,
    clock: Arc<dyn Clock>,
    reload_flag: ReloadFlag,
    redelivery: RedeliveryFilter,
    last_run: RwLock<Option<SyncOutcome>>,
}

impl ReconciliationEngine {
    pub fn new(settings: EngineSettings, parts: Collaborators) -> Self {
        Self::with_reload_flag(settings, parts, ReloadFlag::new())
    }

    /// Build an engine sharing an existing reload flag.
    pub fn with_reload_flag(settings: EngineSettings, parts: Collaborators, reload_flag: ReloadFlag) -> Self {
        Self {
            settings,
            ledger: parts.ledger,
            watermarks: parts.watermarks,
            movements: parts.movements,
            snapshots: parts.snapshots,
            catalog: parts.catalog,
            clock: parts.clock,
            reload_flag,
            redelivery: RedeliveryFilter::new(),
            last_run: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn reload_in_progress(&self) -> bool {
        self.reload_flag.is_set()
    }

    /// Outcome of the most recent incremental sync, if any ran.
    pub fn last_run(&self) -> Option<SyncOutcome> {
        self.last_run.read().ok().and_then(|guard| guard.clone())
    }

    /// Local business day according to the clock and the configured offset.
    pub fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.settings.utc_offset)
            .date_naive()
    }

    pub async fn watermark(&self) -> Result<Option<Watermark>, ReconcileError> {
        self.watermarks.load().await.map_err(ReconcileError::Watermark)
    }

    // ---- incremental sync ----

    /// Process the days after the watermark, bounded by `max_days_per_run`.
    ///
    /// A running full reload turns this into a logged no-op.
    #[instrument(name = "incremental_sync", skip(self), err)]
    pub async fn incremental_sync(&self) -> Result<SyncOutcome, ReconcileError> {
        if self.reload_flag.is_set() {
            tracing::info!("full reload in progress, skipping incremental sync");
            let outcome = SyncOutcome::skipped(self.clock.now());
            self.remember(&outcome);
            return Ok(outcome);
        }

        let today = self.today();
        let before = self.load_or_seed_watermark(today).await?;

        let mut cursor = DayCursor::start(before.last_processed, today, self.settings.max_days_per_run);
        let mut pass = SyncPass::new(self.settings.same_day_policy);
        let mut days = Vec::new();

        while let Some(day) = cursor.next_day() {
            let report = self.sync_day(day, today, &mut pass).await;
            if report.is_complete() {
                cursor.complete(day, report.applied);
            } else {
                cursor.halt();
            }
            days.push(report);
        }

        let attempts: u64 = days.iter().map(|d| d.store_fetches).sum();
        let failures: u64 = days.iter().map(|d| d.store_failures).sum();
        if attempts > 0 && failures == attempts {
            tracing::error!(attempts, "every movement fetch failed, watermark left in place");
            return Err(ReconcileError::FeedUnavailable { attempts, failures });
        }

        let mut watermark_after = Some(before.last_processed);
        if let Some(processed) = cursor.watermark() {
            let next = processed.max(before.last_processed);
            self.watermarks
                .store(Watermark::new(next, self.clock.now()))
                .await
                .map_err(ReconcileError::Watermark)?;
            self.redelivery.prune_before(next);
            watermark_after = Some(next);
        }

        let applied = days.iter().map(|d| d.applied).sum();
        tracing::info!(
            applied,
            days = days.len(),
            watermark = ?watermark_after,
            "incremental sync finished"
        );

        let outcome = SyncOutcome {
            skipped: false,
            applied,
            days,
            watermark_before: Some(before.last_processed),
            watermark_after,
            finished_at: self.clock.now(),
        };
        self.remember(&outcome);
        Ok(outcome)
    }

    fn remember(&self, outcome: &SyncOutcome) {
        if let Ok(mut last) = self.last_run.write() {
            *last = Some(outcome.clone());
        }
    }

    async fn load_or_seed_watermark(&self, today: NaiveDate) -> Result<Watermark, ReconcileError> {
        if let Some(existing) = self.watermarks.load().await.map_err(ReconcileError::Watermark)? {
            return Ok(existing);
        }

        let seeded = Watermark::new(
            days_before(today, self.settings.watermark_seed_days),
            self.clock.now(),
        );
        self.watermarks
            .store(seeded)
            .await
            .map_err(ReconcileError::Watermark)?;
        tracing::info!(last_processed = %seeded.last_processed, "seeded watermark");
        Ok(seeded)
    }

    /// Fetch every store's movements for `day`, then apply them.
    ///
    /// Nothing is applied when any store failed, so a retried day never folds
    /// the same movements in twice.
    #[instrument(name = "sync_day", skip_all, fields(day = %day))]
    async fn sync_day(&self, day: NaiveDate, today: NaiveDate, pass: &mut SyncPass) -> DayReport {
        let mut report = DayReport::new(day);
        let mut fetched = Vec::with_capacity(self.settings.stores.len());

        for store in &self.settings.stores {
            report.store_fetches += 1;
            match self.fetch_day(store, day).await {
                Ok(events) => fetched.push(events),
                Err(e) => {
                    tracing::warn!(%store, %day, error = %e, "movement fetch failed");
                    report.store_failures += 1;
                }
            }
        }

        if !report.is_complete() {
            tracing::warn!(failed = report.store_failures, "day incomplete, deferred to the next run");
            return report;
        }

        for event in fetched.iter().flatten() {
            self.apply_event(event, today, pass, &mut report).await;
        }

        tracing::debug!(applied = report.applied, stale = report.stale, "day processed");
        report
    }

    async fn fetch_day(&self, store: &StoreCode, day: NaiveDate) -> Result<Vec<MovementEvent>, FeedError> {
        let mut events = Vec::new();
        let mut page = 1u32;

        loop {
            let movements = self
                .movements
                .fetch_movements(store, day, page, self.settings.movement_page_size)
                .await?;
            events.extend(movements.events);
            if page >= movements.total_pages {
                return Ok(events);
            }
            page += 1;
        }
    }

    async fn apply_event(&self, event: &MovementEvent, today: NaiveDate, pass: &mut SyncPass, report: &mut DayReport) {
        let effective = match event.effective_day(today) {
            Ok(effective) => effective,
            Err(e) => {
                tracing::warn!(item_code = %event.item_code, store = %event.store, error = %e, "discarding event with malformed date");
                report.malformed += 1;
                return;
            }
        };
        let day = effective.day;

        if let Some(reported) = effective.clamped_from {
            tracing::warn!(item_code = %event.item_code, store = %event.store, %reported, %day, "future-dated event clamped to today");
            report.clamped += 1;
        }

        if let Some(id) = event.movement_id.as_deref() {
            if self.redelivery.contains(&event.store, day, id) {
                report.duplicates += 1;
                return;
            }
        }

        let item = match self.catalog.resolve(&event.item_code).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                tracing::warn!(item_code = %event.item_code, store = %event.store, %day, "item not in catalog, discarding event");
                report.unresolved += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(item_code = %event.item_code, error = %e, "catalog lookup failed, discarding event");
                report.storage_failures += 1;
                return;
            }
        };

        let mut row = match self.ledger.get(item.id).await {
            Ok(Some(row)) => row,
            Ok(None) => LedgerRow::seed(item.id, day),
            Err(e) => {
                tracing::error!(item_code = %event.item_code, error = %e, "ledger read failed, event lost for this pass");
                report.storage_failures += 1;
                return;
            }
        };

        let transition = row.apply_movement(&event.store, day, event.net(), pass);
        if let Transition::Stale { row_epoch } = transition {
            tracing::debug!(item_code = %event.item_code, %day, %row_epoch, "stale event discarded");
            report.stale += 1;
            return;
        }

        match self.ledger.upsert(&row).await {
            Ok(()) => {
                report.applied += 1;
                if let Some(id) = event.movement_id.as_deref() {
                    self.redelivery.record(&event.store, day, id);
                }
            }
            Err(e) => {
                tracing::error!(item_code = %event.item_code, store = %event.store, %day, error = %e, "ledger write failed, event lost for this pass");
                report.storage_failures += 1;
            }
        }
    }

    // ---- full reload ----

    /// Overwrite rows from per-store snapshots.
    ///
    /// Each store's position is requested as of `today - reload_anchor_days`.
    /// Once at least one store loaded, the watermark moves to that anchor so
    /// the following syncs replay the days since.
    #[instrument(name = "full_reload", skip_all, fields(target = %target), err)]
    pub async fn full_reload(&self, target: ReloadTarget) -> Result<ReloadOutcome, ReconcileError> {
        let stores = match &target {
            ReloadTarget::All => self.settings.stores.clone(),
            ReloadTarget::Store(store) if self.settings.stores.contains(store) => vec![store.clone()],
            ReloadTarget::Store(store) => return Err(ReconcileError::UnknownStore(store.clone())),
        };

        let _guard = self.reload_flag.try_acquire().ok_or(ReconcileError::ReloadInProgress)?;

        let today = self.today();
        let anchor = days_before(today, self.settings.reload_anchor_days);

        let mut reports = Vec::with_capacity(stores.len());
        for store in stores {
            reports.push(self.reload_store(store, anchor).await);
        }

        let loaded = reports.iter().filter(|r| r.loaded).count();
        let mut watermark = None;
        if loaded > 0 {
            self.watermarks
                .store(Watermark::new(anchor, self.clock.now()))
                .await
                .map_err(ReconcileError::Watermark)?;
            for report in reports.iter().filter(|r| r.loaded) {
                self.redelivery.forget_store(&report.store);
            }
            watermark = Some(anchor);
        }

        let message = reload_message(&reports, anchor);
        if loaded == reports.len() {
            tracing::info!(%anchor, stores = loaded, "full reload finished");
        } else {
            tracing::warn!(%anchor, loaded, total = reports.len(), "full reload finished with failures");
        }

        let filter = LedgerFilter {
            store: match &target {
                ReloadTarget::All => None,
                ReloadTarget::Store(store) => Some(store.clone()),
            },
            ..LedgerFilter::default()
        };
        let ledger = self.ledger_snapshot(&filter).await?;

        Ok(ReloadOutcome {
            target,
            anchor,
            message,
            stores: reports,
            watermark,
            ledger,
        })
    }

    async fn reload_store(&self, store: StoreCode, anchor: NaiveDate) -> StoreReloadReport {
        let mut report = StoreReloadReport::new(store.clone());
        let mut page = 1u32;

        loop {
            let fetched = self
                .snapshots
                .fetch_snapshot(&store, anchor, page, self.settings.snapshot_page_size)
                .await;

            let snapshot = match fetched {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(%store, page, error = %e, "snapshot fetch failed, skipping store");
                    report.error = Some(e.to_string());
                    return report;
                }
            };

            for entry in &snapshot.entries {
                report.entries += 1;

                let item = match self.catalog.resolve(&entry.item_code).await {
                    Ok(Some(item)) => item,
                    Ok(None) => {
                        tracing::warn!(item_code = %entry.item_code, %store, "item not in catalog, skipping snapshot entry");
                        report.unresolved += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(item_code = %entry.item_code, error = %e, "catalog lookup failed");
                        report.storage_failures += 1;
                        continue;
                    }
                };

                let mut row = match self.ledger.get(item.id).await {
                    Ok(Some(row)) => row,
                    Ok(None) => LedgerRow::seed(item.id, anchor),
                    Err(e) => {
                        tracing::error!(item_code = %entry.item_code, error = %e, "ledger read failed");
                        report.storage_failures += 1;
                        continue;
                    }
                };

                row.overwrite_from_snapshot(&store, entry.quantity, anchor);

                match self.ledger.upsert(&row).await {
                    Ok(()) => report.overwritten += 1,
                    Err(e) => {
                        tracing::error!(item_code = %entry.item_code, %store, error = %e, "ledger write failed");
                        report.storage_failures += 1;
                    }
                }
            }

            if page >= snapshot.total_pages {
                break;
            }
            page += 1;
        }

        report.loaded = true;
        tracing::info!(%store, entries = report.entries, overwritten = report.overwritten, "store reloaded");
        report
    }

    // ---- reads ----

    /// Ledger rows joined with their catalog items, filtered.
    pub async fn ledger_snapshot(&self, filter: &LedgerFilter) -> Result<Vec<LedgerView>, ReconcileError> {
        let rows = self.ledger.list().await.map_err(ReconcileError::Ledger)?;
        let items: HashMap<ItemId, _> = self
            .catalog
            .list()
            .await
            .map_err(ReconcileError::Catalog)?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut views: Vec<LedgerView> = rows
            .into_iter()
            .map(|row| LedgerView {
                item: items.get(&row.item_id()).cloned(),
                row,
            })
            .filter(|view| filter.matches(view))
            .collect();

        views.sort_by(|a, b| {
            let code = |v: &LedgerView| v.item.as_ref().map(|i| i.code.clone());
            code(a).cmp(&code(b))
        });
        Ok(views)
    }
}

fn days_before(day: NaiveDate, n: u32) -> NaiveDate {
    day.checked_sub_days(Days::new(u64::from(n))).unwrap_or(day)
}

fn reload_message(reports: &[StoreReloadReport], anchor: NaiveDate) -> String {
    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| !r.loaded)
        .map(|r| r.store.as_str())
        .collect();
    let loaded = reports.len() - failed.len();

    if failed.is_empty() {
        format!("reloaded {loaded} of {} stores as of {anchor}", reports.len())
    } else {
        format!(
            "partially reloaded {loaded} of {} stores as of {anchor}; failed: {}",
            reports.len(),
            failed.join(", ")
        )
    }
}
