use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use reqwest::StatusCode;
use tokio::sync::Notify;

use stockledger_core::{ItemId, Quantity, StoreCode};
use stockledger_infra::external::{
    FeedError, InMemoryItemCatalog, MovementFeed, MovementPage, SnapshotEntry, SnapshotFeed, SnapshotPage,
};
use stockledger_infra::read_model::{InMemoryLedgerStore, InMemoryWatermarkStore};
use stockledger_infra::reconcile::{Collaborators, EngineSettings};
use stockledger_infra::{FixedClock, ReconciliationEngine};
use stockledger_inventory::{Item, MovementEvent, Watermark};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(engine: Arc<ReconciliationEngine>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = stockledger_api::app::build_app(engine);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn store(code: &str) -> StoreCode {
    StoreCode::new(code).unwrap()
}

#[derive(Default)]
struct StaticMovements {
    by_store_day: HashMap<(StoreCode, NaiveDate), Vec<MovementEvent>>,
}

#[async_trait::async_trait]
impl MovementFeed for StaticMovements {
    async fn fetch_movements(
        &self,
        store: &StoreCode,
        day: NaiveDate,
        page: u32,
        _page_size: u32,
    ) -> Result<MovementPage, FeedError> {
        let events = self.by_store_day.get(&(store.clone(), day)).cloned().unwrap_or_default();
        Ok(MovementPage {
            page,
            total_pages: 1,
            events,
        })
    }
}

/// Snapshot feed whose first request blocks until released.
#[derive(Default)]
struct GatedSnapshots {
    entries: HashMap<StoreCode, Vec<SnapshotEntry>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

#[async_trait::async_trait]
impl SnapshotFeed for GatedSnapshots {
    async fn fetch_snapshot(
        &self,
        store: &StoreCode,
        _position_date: NaiveDate,
        page: u32,
        _page_size: u32,
    ) -> Result<SnapshotPage, FeedError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(SnapshotPage {
            page,
            total_pages: 1,
            entries: self.entries.get(store).cloned().unwrap_or_default(),
        })
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn build_engine(snapshots: GatedSnapshots) -> Arc<ReconciliationEngine> {
    let item = Item::new(ItemId::new(), "X-100", "Linho cru").with_category("Tecidos");

    let mut movements = StaticMovements::default();
    movements.by_store_day.insert(
        (store("A"), day(11)),
        vec![MovementEvent {
            movement_id: Some("m-1".to_string()),
            item_code: "X-100".to_string(),
            store: store("A"),
            raw_date: "11/03/2025".to_string(),
            quantity_in: Quantity::from_units(5),
            quantity_out: Quantity::ZERO,
        }],
    );

    let settings = EngineSettings {
        stores: vec![store("A"), store("B")],
        utc_offset: FixedOffset::west_opt(3 * 3600).unwrap(),
        ..EngineSettings::default()
    };

    let parts = Collaborators {
        ledger: Arc::new(InMemoryLedgerStore::new()),
        watermarks: Arc::new(InMemoryWatermarkStore::starting_at(Watermark::new(day(10), Utc::now()))),
        movements: Arc::new(movements),
        snapshots: Arc::new(snapshots),
        catalog: Arc::new(InMemoryItemCatalog::with_items([item])),
        clock: Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 12, 15, 0, 0).unwrap())),
    };

    Arc::new(ReconciliationEngine::new(settings, parts))
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(build_engine(GatedSnapshots::default())).await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn incremental_sync_updates_ledger_and_watermark() {
    let srv = TestServer::spawn(build_engine(GatedSnapshots::default())).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/sync/incremental", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["skipped"], false);
    assert_eq!(outcome["applied"], 1);
    assert_eq!(outcome["watermark_after"], "2025-03-11");

    let res = client
        .get(format!("{}/ledger?store=a", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rows: serde_json::Value = res.json().await.unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["code"], "X-100");
    assert_eq!(rows[0]["balances"]["A"]["current"], 5.0);
    assert_eq!(rows[0]["total_current"], 5.0);

    let res = client
        .get(format!("{}/sync/watermark", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["last_processed"], "2025-03-11");
    assert_eq!(body["today"], "2025-03-12");
    assert_eq!(body["reload_in_progress"], false);
    assert_eq!(body["last_run"]["applied"], 1);
}

#[tokio::test]
async fn ledger_filters_reject_invalid_store_codes() {
    let srv = TestServer::spawn(build_engine(GatedSnapshots::default())).await;

    let res = reqwest::get(format!("{}/ledger?store=not%20a%20store", srv.base_url))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn reload_of_unknown_store_is_not_found() {
    let srv = TestServer::spawn(build_engine(GatedSnapshots::default())).await;

    let res = reqwest::Client::new()
        .post(format!("{}/sync/reload/ZZZ", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unknown_store");
}

#[tokio::test]
async fn concurrent_reload_is_rejected_and_sync_is_skipped() {
    let release = Arc::new(Notify::new());
    let mut snapshots = GatedSnapshots::default();
    snapshots.entries.insert(
        store("A"),
        vec![SnapshotEntry {
            item_code: "X-100".to_string(),
            quantity: Quantity::from_units(40),
        }],
    );
    snapshots.gate = Mutex::new(Some(release.clone()));

    let engine = build_engine(snapshots);
    let srv = TestServer::spawn(engine.clone()).await;
    let client = reqwest::Client::new();

    let first = {
        let client = client.clone();
        let url = format!("{}/sync/reload/all", srv.base_url);
        tokio::spawn(async move { client.post(url).send().await.unwrap() })
    };

    for _ in 0..200 {
        if engine.reload_in_progress() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(engine.reload_in_progress(), "reload never started");

    let res = client
        .post(format!("{}/sync/reload/all", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(format!("{}/sync/incremental", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["skipped"], true);

    release.notify_one();

    let res = first.await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["target"], "all");
    assert_eq!(body["anchor"], "2025-03-02");
    assert_eq!(body["watermark"], "2025-03-02");
    assert_eq!(body["partial"], false);
    assert_eq!(body["ledger"][0]["balances"]["A"]["current"], 40.0);
    assert!(!engine.reload_in_progress());
}
