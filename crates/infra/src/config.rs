//! Configuration loading and representation.
//!
//! Everything comes from environment variables (`STOCKLEDGER_*`, plus
//! `DATABASE_URL`) with defaults suitable for local development.

use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;

use stockledger_core::StoreCode;
use stockledger_inventory::SameDayTotalPolicy;

use crate::reconcile::EngineSettings;

/// Stores tracked when `STOCKLEDGER_STORES` is not set.
pub const DEFAULT_STORES: [&str; 6] = [
    "VITORIA",
    "TELARAME",
    "SUPERTELAS",
    "UNIAO",
    "LINHARES",
    "ESTRUTURACO",
];

pub const DEFAULT_FEED_BASE_URL: &str = "https://app.omie.com.br/api/v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Credentials and location of one store in the system of record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub code: StoreCode,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    /// Stock location code inside the store's account (0 = all locations).
    pub location: i64,
}

impl StoreConfig {
    pub fn has_credentials(&self) -> bool {
        self.app_key.is_some() && self.app_secret.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Postgres URL; in-memory stores are used when absent.
    pub url: Option<String>,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub movement_page_size: u32,
    pub snapshot_page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_days_per_run: u32,
    pub watermark_seed_days: u32,
    pub reload_anchor_days: u32,
    pub utc_offset: FixedOffset,
    pub same_day_policy: SameDayTotalPolicy,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub sync: SyncConfig,
    pub stores: Vec<StoreConfig>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database = DatabaseConfig {
            url: get("DATABASE_URL"),
            connect_attempts: parse_or(&get, "STOCKLEDGER_DB_CONNECT_ATTEMPTS", 10u32)?,
            retry_delay: Duration::from_secs(parse_or(&get, "STOCKLEDGER_DB_RETRY_DELAY_SECS", 3u64)?),
        };

        let feed = FeedConfig {
            base_url: get("STOCKLEDGER_FEED_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FEED_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(parse_or(&get, "STOCKLEDGER_FEED_TIMEOUT_SECS", 30u64)?),
            movement_page_size: parse_or(&get, "STOCKLEDGER_PAGE_SIZE", 1000u32)?,
            snapshot_page_size: parse_or(&get, "STOCKLEDGER_SNAPSHOT_PAGE_SIZE", 500u32)?,
        };
        if feed.movement_page_size == 0 || feed.snapshot_page_size == 0 {
            return Err(ConfigError::invalid("STOCKLEDGER_PAGE_SIZE", "0", "page sizes must be positive"));
        }

        let offset_hours: i32 = parse_or(&get, "STOCKLEDGER_UTC_OFFSET_HOURS", -3)?;
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            ConfigError::invalid(
                "STOCKLEDGER_UTC_OFFSET_HOURS",
                &offset_hours.to_string(),
                "offset must be within ±23 hours",
            )
        })?;

        let sync = SyncConfig {
            max_days_per_run: parse_or(&get, "STOCKLEDGER_MAX_DAYS_PER_RUN", 3u32)?,
            watermark_seed_days: parse_or(&get, "STOCKLEDGER_WATERMARK_SEED_DAYS", 10u32)?,
            reload_anchor_days: parse_or(&get, "STOCKLEDGER_RELOAD_ANCHOR_DAYS", 10u32)?,
            utc_offset,
            same_day_policy: parse_or(&get, "STOCKLEDGER_SAME_DAY_POLICY", SameDayTotalPolicy::default())?,
            interval: Duration::from_secs(parse_or(&get, "STOCKLEDGER_SYNC_INTERVAL_SECS", 60u64)?),
        };
        if sync.max_days_per_run == 0 {
            return Err(ConfigError::invalid(
                "STOCKLEDGER_MAX_DAYS_PER_RUN",
                "0",
                "at least one day must be processed per run",
            ));
        }
        if sync.interval.is_zero() {
            return Err(ConfigError::invalid(
                "STOCKLEDGER_SYNC_INTERVAL_SECS",
                "0",
                "interval must be positive",
            ));
        }

        let store_list = get("STOCKLEDGER_STORES").unwrap_or_else(|| DEFAULT_STORES.join(","));
        let mut stores: Vec<StoreConfig> = Vec::new();
        for raw in store_list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let code = StoreCode::new(raw)
                .map_err(|e| ConfigError::invalid("STOCKLEDGER_STORES", raw, e.to_string()))?;
            if stores.iter().any(|s| s.code == code) {
                return Err(ConfigError::invalid("STOCKLEDGER_STORES", raw, "duplicate store"));
            }
            let prefix = format!("STOCKLEDGER_STORE_{}", code.as_str().replace('-', "_"));
            stores.push(StoreConfig {
                app_key: get(&format!("{prefix}_APP_KEY")),
                app_secret: get(&format!("{prefix}_APP_SECRET")),
                location: parse_or(&get, &format!("{prefix}_LOCATION"), 0i64)?,
                code,
            });
        }
        if stores.is_empty() {
            return Err(ConfigError::invalid("STOCKLEDGER_STORES", &store_list, "no stores configured"));
        }

        Ok(Self {
            bind_addr: get("STOCKLEDGER_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            database,
            feed,
            sync,
            stores,
        })
    }

    pub fn store_codes(&self) -> Vec<StoreCode> {
        self.stores.iter().map(|s| s.code.clone()).collect()
    }

    /// Engine parameters derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            stores: self.store_codes(),
            movement_page_size: self.feed.movement_page_size,
            snapshot_page_size: self.feed.snapshot_page_size,
            max_days_per_run: self.sync.max_days_per_run,
            watermark_seed_days: self.sync.watermark_seed_days,
            reload_anchor_days: self.sync.reload_anchor_days,
            utc_offset: self.sync.utc_offset,
            same_day_policy: self.sync.same_day_policy,
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}
