//! Wiring of the reconciliation engine from configuration.
//!
//! With `DATABASE_URL` set the ledger, watermark and catalog live in Postgres;
//! otherwise everything is kept in memory (useful for local runs and tests).

use std::sync::Arc;

use anyhow::Context;

use stockledger_infra::external::{InMemoryItemCatalog, ItemCatalog, OmieClient, PostgresItemCatalog};
use stockledger_infra::read_model::{
    InMemoryLedgerStore, InMemoryWatermarkStore, LedgerStore, PostgresLedgerStore, PostgresWatermarkStore,
    WatermarkStore,
};
use stockledger_infra::reconcile::Collaborators;
use stockledger_infra::{db, AppConfig, ReconciliationEngine, SystemClock};

/// Build an engine backed by the configured stores and the Omie feed.
pub async fn build_engine(config: &AppConfig) -> anyhow::Result<Arc<ReconciliationEngine>> {
    for store in config.stores.iter().filter(|s| !s.has_credentials()) {
        tracing::warn!(store = %store.code, "no feed credentials configured; incremental sync cannot pass any day until they are set");
    }

    let client = Arc::new(OmieClient::new(&config.feed, &config.stores).context("failed to build feed client")?);

    let (ledger, watermarks, catalog): (Arc<dyn LedgerStore>, Arc<dyn WatermarkStore>, Arc<dyn ItemCatalog>) =
        match config.database.url.as_deref() {
            Some(url) => {
                let pool = db::connect_with_retry(url, &config.database).await?;
                tracing::info!("using postgres-backed ledger, watermark and catalog");
                (
                    Arc::new(PostgresLedgerStore::new(pool.clone())),
                    Arc::new(PostgresWatermarkStore::new(pool.clone())),
                    Arc::new(PostgresItemCatalog::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores");
                (
                    Arc::new(InMemoryLedgerStore::new()),
                    Arc::new(InMemoryWatermarkStore::new()),
                    Arc::new(InMemoryItemCatalog::new()),
                )
            }
        };

    let parts = Collaborators {
        ledger,
        watermarks,
        movements: client.clone(),
        snapshots: client,
        catalog,
        clock: Arc::new(SystemClock),
    };

    Ok(Arc::new(ReconciliationEngine::new(config.engine_settings(), parts)))
}
