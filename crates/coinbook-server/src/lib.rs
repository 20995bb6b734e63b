//! HTTP surface for [`coinbook::PortfolioService`].
//!
//! - `POST /portfolio/value` with `{"exchanges": ["binance", ...]}` returns a
//!   portfolio snapshot.
//! - `GET /exchanges` lists supported exchange identifiers.
//! - `GET /health` is a liveness probe.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use coinbook::{PortfolioService, PortfolioSnapshot};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub service: PortfolioService,
}

impl AppState {
    pub fn new(service: PortfolioService) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

#[derive(Debug, Deserialize)]
pub struct ValueRequest {
    pub exchanges: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangesResponse {
    pub exchanges: Vec<String>,
}

async fn portfolio_value(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValueRequest>,
) -> Json<PortfolioSnapshot> {
    info!(exchanges = ?request.exchanges, "valuation requested");
    Json(state.service.portfolio_value(&request.exchanges).await)
}

async fn list_exchanges(State(state): State<Arc<AppState>>) -> Json<ExchangesResponse> {
    let exchanges = state
        .service
        .supported_exchanges()
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    Json(ExchangesResponse { exchanges })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/portfolio/value", post(portfolio_value))
        .route("/exchanges", get(list_exchanges))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
