//! Infrastructure layer: persistence, external feeds, configuration and the
//! reconciliation engine that ties them together.

pub mod clock;
pub mod config;
pub mod db;
pub mod external;
pub mod read_model;
pub mod reconcile;
pub mod workers;


pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use reconcile::{ReconcileError, ReconciliationEngine};
