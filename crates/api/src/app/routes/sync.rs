use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockledger_infra::reconcile::ReloadTarget;
use stockledger_infra::ReconciliationEngine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/incremental", post(run_incremental))
        .route("/reload/:target", post(run_reload))
        .route("/watermark", get(get_watermark))
}

pub async fn run_incremental(
    Extension(engine): Extension<Arc<ReconciliationEngine>>,
) -> axum::response::Response {
    match engine.incremental_sync().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

/// `target` is `all` or a configured store code.
pub async fn run_reload(
    Extension(engine): Extension<Arc<ReconciliationEngine>>,
    Path(target): Path<String>,
) -> axum::response::Response {
    let target: ReloadTarget = match target.parse() {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match engine.full_reload(target).await {
        Ok(outcome) => Json(dto::ReloadResponse::from(outcome)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn get_watermark(
    Extension(engine): Extension<Arc<ReconciliationEngine>>,
) -> axum::response::Response {
    match engine.watermark().await {
        Ok(watermark) => Json(dto::WatermarkResponse::new(
            watermark,
            engine.today(),
            engine.reload_in_progress(),
            engine.last_run(),
        ))
        .into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}
