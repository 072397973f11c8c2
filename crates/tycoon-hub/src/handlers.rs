//! REST endpoint handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health` | Liveness, current tick and scheduler counters |
//! | `GET` | `/api/market/data` | Latest market fields (bearer token required) |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tycoon_core::StatsSnapshot;

use crate::error::HubError;
use crate::state::HubState;

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// Always `"OK"` when the hub answers.
    pub status: &'static str,
    /// Human-readable status line.
    pub message: &'static str,
    /// Latest completed or restored tick, if any.
    pub tick_number: Option<u64>,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Scheduler counters, when a scheduler is attached.
    pub scheduler: Option<StatsSnapshot>,
}

/// Body of `GET /api/market/data`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    /// Tick the figures belong to.
    pub tick_number: u64,
    /// BTC price in USD.
    pub btc_price: f64,
    /// Network difficulty.
    pub difficulty: f64,
    /// Network hashrate in TH/s.
    pub network_hashrate: f64,
    /// When the tick ran.
    pub timestamp: DateTime<Utc>,
}

/// `GET /api/health`
pub async fn health(State(state): State<Arc<HubState>>) -> Json<Health> {
    Json(Health {
        status: "OK",
        message: "Bitcoin Tycoon engine is running",
        tick_number: state.publisher.latest().map(|s| s.tick_number),
        connections: state.registry.len().await,
        scheduler: state.stats.as_ref().map(|s| s.snapshot()),
    })
}

/// `GET /api/market/data`
pub async fn market_data(
    State(state): State<Arc<HubState>>,
    headers: HeaderMap,
) -> Result<Json<MarketData>, HubError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| HubError::Unauthorized("Access token required".to_owned()))?;
    state.verifier.verify(token)?;

    let latest = state.publisher.latest().ok_or(HubError::NotReady)?;
    Ok(Json(MarketData {
        tick_number: latest.tick_number,
        btc_price: latest.btc_price,
        difficulty: latest.difficulty,
        network_hashrate: latest.network_hashrate,
        timestamp: latest.timestamp,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
