use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all ledger endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/ledger/root", get(handler::root_handler))
        .route("/v1/ledger/receipts", get(handler::receipts_handler))
        .route("/v1/ledger/stream", get(handler::stream_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
