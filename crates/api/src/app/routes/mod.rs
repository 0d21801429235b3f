use axum::Router;

pub mod ledger;
pub mod sync;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/sync", sync::router())
        .nest("/ledger", ledger::router())
}
