use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockledger_infra::ReconciliationEngine;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_ledger))
}

/// `GET /ledger?store=&category=&code=&non_zero=`
pub async fn list_ledger(
    Extension(engine): Extension<Arc<ReconciliationEngine>>,
    Query(query): Query<dto::LedgerQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match engine.ledger_snapshot(&filter).await {
        Ok(views) => {
            let body: Vec<dto::LedgerEntryResponse> = views.iter().map(dto::LedgerEntryResponse::from).collect();
            Json(body).into_response()
        }
        Err(e) => errors::reconcile_error_to_response(e),
    }
}
