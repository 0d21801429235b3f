//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: builds the reconciliation engine from configuration
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockledger_infra::ReconciliationEngine;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around an already-wired engine.
pub fn build_app(engine: Arc<ReconciliationEngine>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(engine))
        .layer(ServiceBuilder::new())
}
