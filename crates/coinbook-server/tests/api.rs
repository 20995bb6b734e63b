use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use coinbook::exchange::{
    BalanceEntry, ExchangeClient, ExchangeError, ExchangeId, ExchangeRegistry, Ticker, TradingPair,
};
use coinbook::market_data::{AssetListing, MarketDataProvider, SpotPrices};
use coinbook::pricing::PriceCache;
use coinbook::PortfolioService;
use coinbook_server::{app_router, AppState, ExchangesResponse, HealthResponse};
use tower::ServiceExt;

struct FixedExchange {
    id: ExchangeId,
}

#[async_trait::async_trait]
impl ExchangeClient for FixedExchange {
    fn id(&self) -> &ExchangeId {
        &self.id
    }

    async fn fetch_balances(&self) -> Result<Vec<BalanceEntry>, ExchangeError> {
        Ok(vec![
            BalanceEntry::new("BTC", Some(0.5)),
            BalanceEntry::new("DUST", Some(0.0)),
        ])
    }

    async fn fetch_ticker(&self, pair: &TradingPair) -> Result<Ticker, ExchangeError> {
        Err(ExchangeError::UnsupportedPair(pair.to_string()))
    }
}

struct FixedMarket;

#[async_trait::async_trait]
impl MarketDataProvider for FixedMarket {
    async fn list_assets(&self) -> anyhow::Result<Vec<AssetListing>> {
        Ok(vec![AssetListing::new("bitcoin", "btc")])
    }

    async fn get_price(&self, ids: &[String], vs_currency: &str) -> anyhow::Result<SpotPrices> {
        Ok(ids
            .iter()
            .filter(|id| id.as_str() == "bitcoin")
            .map(|id| (id.clone(), HashMap::from([(vs_currency.to_string(), 60000.0)])))
            .collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn test_router() -> axum::Router {
    let registry = ExchangeRegistry::new().register("mockex", |settings| {
        Ok(Arc::new(FixedExchange { id: settings.id }) as Arc<dyn ExchangeClient>)
    });
    let service = PortfolioService::from_parts(
        Arc::new(registry),
        Arc::new(FixedMarket),
        Arc::new(PriceCache::new(Duration::from_secs(30))),
    );
    app_router(AppState::new(service))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = test_router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn exchanges_lists_registry() {
    let response = test_router()
        .oneshot(Request::builder().uri("/exchanges").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let listed: ExchangesResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(listed.exchanges, vec!["mockex"]);
}

#[tokio::test]
async fn portfolio_value_returns_snapshot() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/portfolio/value")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"exchanges": ["MockEx", "notarealexchange"]}"#))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total_usd"], 30000.0);
    assert_eq!(json["cache_ttl"], 30);
    let details = json["details"].as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["exchange"], "mockex");
    assert_eq!(details[0]["asset"], "BTC");
    assert_eq!(details[0]["price_usd"], 60000.0);
    assert_eq!(json["exchanges"][1]["status"], "unsupported");
}

#[tokio::test]
async fn malformed_body_is_client_error() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/portfolio/value")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"exchange": "binance"}"#))
        .unwrap();

    let response = test_router().oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}
