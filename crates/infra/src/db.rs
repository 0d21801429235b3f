//! Postgres connection bootstrap.
//!
//! The pool is opened with a bounded number of attempts and a fixed delay
//! between them; the caller decides what to do once the budget is spent
//! (the API binary exits non-zero).

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
///
/// Returns the last error once every attempt has failed.
pub async fn retry_with_fixed_backoff<T, E, F, Fut>(
    label: &str,
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts = attempts,
                    retry_in = ?delay,
                    error = %e,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(operation = label, attempts, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}

/// Open a pool against `url`, retrying per `config`, then make sure the schema exists.
pub async fn connect_with_retry(url: &str, config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = retry_with_fixed_backoff(
        "database_connect",
        config.connect_attempts,
        config.retry_delay,
        |_| PgPoolOptions::new().max_connections(5).connect(url),
    )
    .await
    .with_context(|| format!("could not connect to database after {} attempts", config.connect_attempts))?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Create the tables used by the Postgres-backed stores if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to bootstrap schema")?;
    }
    Ok(())
}

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS items (
        item_id UUID PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        category TEXT,
        unit_value BIGINT NOT NULL DEFAULT 0,
        origin_store TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_rows (
        item_id UUID PRIMARY KEY,
        current_epoch DATE NOT NULL,
        previous_epoch DATE NOT NULL,
        balances JSONB NOT NULL,
        total_current BIGINT NOT NULL,
        total_previous BIGINT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CHECK (current_epoch >= previous_epoch)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_watermark (
        id SMALLINT PRIMARY KEY CHECK (id = 1),
        last_processed DATE NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
];
