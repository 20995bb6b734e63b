use anyhow::Result;
use coinbook::market_data::{CoinGeckoMarketData, MarketDataProvider};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn coingecko_lists_assets_from_mock_server() -> Result<()> {
    let server = MockServer::start().await;
    let provider = CoinGeckoMarketData::new().with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/coins/list"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[
                {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin"},
                {"id": "ethereum", "symbol": "eth", "name": "Ethereum"}
            ]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let assets = provider.list_assets().await?;
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].id, "bitcoin");
    assert_eq!(assets[0].symbol, "btc");
    assert_eq!(assets[1].name, "Ethereum");

    Ok(())
}

#[tokio::test]
async fn coingecko_simple_price_drops_nulls_and_missing_ids() -> Result<()> {
    let server = MockServer::start().await;
    let provider = CoinGeckoMarketData::new()
        .with_base_url(server.uri())
        .with_api_key("demo-key");

    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "bitcoin,ghost,delisted"))
        .and(query_param("vs_currencies", "usd"))
        .and(header("x-cg-demo-api-key", "demo-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"bitcoin": {"usd": 60000.5}, "delisted": {"usd": null}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let ids = vec![
        "bitcoin".to_string(),
        "ghost".to_string(),
        "delisted".to_string(),
    ];
    let prices = provider.get_price(&ids, "USD").await?;

    assert_eq!(prices.len(), 1);
    assert_eq!(prices["bitcoin"]["usd"], 60000.5);

    Ok(())
}

#[tokio::test]
async fn coingecko_error_status_is_reported() -> Result<()> {
    let server = MockServer::start().await;
    let provider = CoinGeckoMarketData::new().with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/coins/list"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = provider.list_assets().await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("429"), "unexpected error: {message}");

    Ok(())
}
