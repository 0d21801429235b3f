use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_core::DomainError;
use stockledger_infra::ReconcileError;

pub fn reconcile_error_to_response(err: ReconcileError) -> axum::response::Response {
    match err {
        ReconcileError::ReloadInProgress => {
            json_error(StatusCode::CONFLICT, "reload_in_progress", err.to_string())
        }
        ReconcileError::UnknownStore(_) => json_error(StatusCode::NOT_FOUND, "unknown_store", err.to_string()),
        ReconcileError::FeedUnavailable { .. } => {
            json_error(StatusCode::BAD_GATEWAY, "feed_unavailable", err.to_string())
        }
        ReconcileError::Watermark(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "watermark_unavailable", err.to_string())
        }
        ReconcileError::Ledger(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "ledger_unavailable", err.to_string())
        }
        ReconcileError::Catalog(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "catalog_unavailable", err.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
