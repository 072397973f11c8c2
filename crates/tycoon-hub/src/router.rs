//! Axum router construction for the hub.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::HubState;
use crate::ws;

/// Build the complete router:
/// - `GET /ws` -- hub `WebSocket`
/// - `GET /api/health` -- liveness and counters
/// - `GET /api/market/data` -- latest market figures
///
/// CORS allows any origin so a browser client on another port can connect
/// during development.
pub fn build_router(state: Arc<HubState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(handlers::health))
        .route("/api/market/data", get(handlers::market_data))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
