use anyhow::Result;
use coinbook::credentials::ExchangeCredentials;
use coinbook::exchange::{BinanceClient, ExchangeClient, ExchangeError, TradingPair};
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BinanceClient {
    BinanceClient::new(Some(ExchangeCredentials::new("test-key", "test-secret")))
        .with_base_url(server.uri())
}

#[tokio::test]
async fn binance_balances_sum_free_and_locked() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .and(query_param("omitZeroBalances", "true"))
        .and(header("X-MBX-APIKEY", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "makerCommission": 10,
                "balances": [
                    {"asset": "BTC", "free": "1.00000000", "locked": "0.50000000"},
                    {"asset": "USDT", "free": "100.00", "locked": "0.00"},
                    {"asset": "BNB", "free": "0.00000000", "locked": "0.00000000"}
                ]
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let balances = client(&server).fetch_balances().await?;
    let assets: Vec<(&str, Option<f64>)> = balances
        .iter()
        .map(|b| (b.asset.as_str(), b.amount))
        .collect();
    assert_eq!(
        assets,
        vec![("BTC", Some(1.5)), ("USDT", Some(100.0)), ("BNB", Some(0.0))]
    );

    let requests = server.received_requests().await.unwrap_or_default();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("timestamp="));
    assert!(query.contains("&signature="));

    Ok(())
}

#[tokio::test]
async fn binance_rejected_key_is_auth_error() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .and(header_exists("X-MBX-APIKEY"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"code":-2015,"msg":"Invalid API-key"}"#),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_balances().await.unwrap_err();
    assert!(matches!(err, ExchangeError::Auth(_)), "got {err:?}");

    Ok(())
}

#[tokio::test]
async fn binance_ticker_reads_last_price() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .and(query_param("symbol", "ETHUSDT"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"symbol": "ETHUSDT", "price": "3012.34000000"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let ticker = client(&server)
        .fetch_ticker(&TradingPair::new("ETH", "USDT"))
        .await?;
    assert_eq!(ticker.pair, "ETH/USDT");
    assert_eq!(ticker.last, Some(3012.34));

    Ok(())
}

#[tokio::test]
async fn binance_unknown_symbol_is_unsupported_pair() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"code":-1121,"msg":"Invalid symbol."}"#),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_ticker(&TradingPair::new("NOPE", "USDT"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::UnsupportedPair(p) if p == "NOPE/USDT"));

    Ok(())
}
