use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use serde::Deserialize;

use super::auth::{authorization_token, encode_query};
use super::Exchange;
use crate::models::{Balance, Market, OrderConfirmation, OrderRequest};
use crate::{Error, Result};

pub const UPBIT_API_BASE: &str = "https://api.upbit.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;
/// Upper bound on candles per request
const MAX_CANDLES: usize = 200;

/// Caution flags that make a market unsafe to trade
const UNSAFE_CAUTIONS: &[&str] = &[
    "PRICE_FLUCTUATIONS",
    "TRADING_VOLUME_SOARING",
    "DEPOSIT_AMOUNT_SOARING",
    "GLOBAL_PRICE_DIFFERENCES",
    "CONCENTRATION_OF_SMALL_ACCOUNTS",
];

/// API key pair for private endpoints
#[derive(Clone)]
pub struct UpbitCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for UpbitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpbitCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Client for the Upbit REST API
#[derive(Clone)]
pub struct UpbitClient {
    client: Client,
    base_url: String,
    credentials: Option<UpbitCredentials>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    market: String,
    trade_price: f64,
    #[allow(dead_code)]
    #[serde(default)]
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct Candle {
    trade_price: f64,
}

#[derive(Debug, Deserialize)]
struct Account {
    currency: String,
    balance: String,
    #[allow(dead_code)]
    #[serde(default)]
    locked: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    uuid: String,
    market: String,
    state: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    volume: Option<String>,
}

impl UpbitClient {
    pub fn new(base_url: impl Into<String>, credentials: Option<UpbitCredentials>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn credentials(&self) -> Result<&UpbitCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| Error::Config("Upbit access/secret keys are not configured".to_string()))
    }

    fn bearer(&self, query: Option<&str>) -> Result<String> {
        let creds = self.credentials()?;
        let token = authorization_token(&creds.access_key, &creds.secret_key, query)?;
        Ok(format!("Bearer {}", token))
    }

    /// Fail with status and body on non-2xx responses
    async fn check_status(response: Response) -> std::result::Result<Response, String> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("API returned status {}: {}", status.as_u16(), body))
    }

    /// Latest trade price for a market
    pub async fn get_ticker_price(&self, market: &str) -> Result<f64> {
        if market.is_empty() {
            return Err(Error::ExternalFetch("market parameter is empty".to_string()));
        }

        let url = format!("{}/v1/ticker", self.base_url);
        tracing::debug!(url = %url, market = %market, "Fetching ticker");

        let response = self
            .client
            .get(&url)
            .query(&[("markets", market)])
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check_status(response).await.map_err(Error::ExternalFetch)?;
        let tickers: Vec<Ticker> = response.json().await?;

        let ticker = tickers
            .into_iter()
            .find(|t| t.market == market)
            .ok_or_else(|| Error::ExternalFetch(format!("no price data available for market: {}", market)))?;

        if ticker.trade_price <= 0.0 {
            return Err(Error::ExternalFetch(format!(
                "invalid price data (zero or negative) for market: {}",
                market
            )));
        }

        Ok(ticker.trade_price)
    }

    /// Closing prices of the last `count` minute candles, oldest first
    pub async fn get_minute_candles(&self, market: &str, unit: u32, count: usize) -> Result<Vec<f64>> {
        let count = count.min(MAX_CANDLES);
        if count == 0 {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/candles/minutes/{}", self.base_url, unit);
        tracing::debug!(url = %url, market = %market, count, "Fetching candles");

        let response = self
            .client
            .get(&url)
            .query(&[("market", market.to_string()), ("count", count.to_string())])
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check_status(response).await.map_err(Error::ExternalFetch)?;
        let candles: Vec<Candle> = response.json().await?;

        // Upbit returns newest first
        let prices: Vec<f64> = candles.into_iter().rev().map(|c| c.trade_price).collect();
        if prices.iter().any(|p| !(p.is_finite() && *p > 0.0)) {
            return Err(Error::ExternalFetch(format!(
                "invalid candle price data for market: {}",
                market
            )));
        }
        Ok(prices)
    }

    /// Account balances; requires credentials
    pub async fn get_accounts(&self) -> Result<Vec<Balance>> {
        let url = format!("{}/v1/accounts", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer(None)?)
            .send()
            .await?;
        let response = Self::check_status(response).await.map_err(Error::ExternalFetch)?;
        let accounts: Vec<Account> = response.json().await?;

        accounts
            .into_iter()
            .map(|account| {
                let amount = account.balance.parse::<f64>().map_err(|e| {
                    Error::ExternalFetch(format!(
                        "invalid {} balance {:?}: {}",
                        account.currency, account.balance, e
                    ))
                })?;
                Ok(Balance {
                    currency: account.currency,
                    amount,
                })
            })
            .collect()
    }

    /// Place a limit order
    pub async fn place_limit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation> {
        let mut params = BTreeMap::new();
        params.insert("market", order.market.clone());
        params.insert("side", order.side.as_upbit_side().to_string());
        params.insert("volume", format!("{:.8}", order.volume));
        params.insert("price", format!("{:.2}", order.price));
        params.insert("ord_type", "limit".to_string());
        let query = encode_query(&params);

        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer(Some(&query))?)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(query)
            .send()
            .await
            .map_err(|e| Error::OrderSubmission(e.to_string()))?;
        let response = Self::check_status(response)
            .await
            .map_err(Error::OrderSubmission)?;
        let placed: OrderResponse = response
            .json()
            .await
            .map_err(|e| Error::OrderSubmission(format!("failed to decode order response: {}", e)))?;

        Ok(OrderConfirmation {
            id: placed.uuid,
            market: placed.market,
            side: order.side,
            price: parse_or(placed.price.as_deref(), order.price),
            volume: parse_or(placed.volume.as_deref(), order.volume),
            state: placed.state,
            timestamp: Utc::now(),
        })
    }

    /// Cancel an open order by its uuid
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let mut params = BTreeMap::new();
        params.insert("uuid", order_id.to_string());
        let query = encode_query(&params);

        let url = format!("{}/v1/order?{}", self.base_url, query);
        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.bearer(Some(&query))?)
            .send()
            .await
            .map_err(|e| Error::OrderSubmission(e.to_string()))?;
        Self::check_status(response)
            .await
            .map_err(|e| Error::OrderSubmission(format!("failed to cancel order {}: {}", order_id, e)))?;

        tracing::info!(order_id = %order_id, "Order cancelled");
        Ok(())
    }

    /// All listed markets with their warning flags
    pub async fn get_markets(&self) -> Result<Vec<Market>> {
        let url = format!("{}/v1/market/all", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("is_details", "true")])
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = Self::check_status(response).await.map_err(Error::ExternalFetch)?;
        Ok(response.json().await?)
    }
}

fn parse_or(value: Option<&str>, fallback: f64) -> f64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(fallback)
}

/// A market is safe when it carries no warning and no listed caution flag
pub fn is_market_safe(market: &Market) -> bool {
    if market.market_event.warning {
        return false;
    }
    !UNSAFE_CAUTIONS.contains(&market.market_event.caution.as_str())
}

/// Keep only markets safe to trade
pub fn safe_markets(markets: Vec<Market>) -> Vec<Market> {
    markets.into_iter().filter(is_market_safe).collect()
}

#[async_trait]
impl Exchange for UpbitClient {
    async fn fetch_current_price(&self, market: &str) -> Result<f64> {
        self.get_ticker_price(market).await
    }

    async fn fetch_recent_prices(&self, market: &str, count: usize) -> Result<Vec<f64>> {
        self.get_minute_candles(market, 1, count).await
    }

    async fn fetch_balance(&self) -> Result<Vec<Balance>> {
        self.get_accounts().await
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation> {
        self.place_limit_order(order).await
    }
}

impl Default for UpbitClient {
    fn default() -> Self {
        Self::new(UPBIT_API_BASE, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketEvent, OrderSide};
    use mockito::Matcher;

    fn market(name: &str, warning: bool, caution: &str) -> Market {
        Market {
            market: name.to_string(),
            korean_name: String::new(),
            english_name: String::new(),
            market_event: MarketEvent {
                warning,
                caution: caution.to_string(),
            },
        }
    }

    fn test_credentials() -> Option<UpbitCredentials> {
        Some(UpbitCredentials {
            access_key: "access".to_string(),
            secret_key: "secret".to_string(),
        })
    }

    #[test]
    fn test_market_safety() {
        assert!(is_market_safe(&market("KRW-BTC", false, "")));
        assert!(!is_market_safe(&market("KRW-XYZ", true, "")));
        assert!(!is_market_safe(&market("KRW-ABC", false, "PRICE_FLUCTUATIONS")));
        assert!(!is_market_safe(&market("KRW-DEF", false, "CONCENTRATION_OF_SMALL_ACCOUNTS")));

        let safe = safe_markets(vec![
            market("KRW-BTC", false, ""),
            market("KRW-XYZ", true, ""),
            market("KRW-ETH", false, ""),
        ]);
        let names: Vec<&str> = safe.iter().map(|m| m.market.as_str()).collect();
        assert_eq!(names, vec!["KRW-BTC", "KRW-ETH"]);
    }

    #[tokio::test]
    async fn test_get_ticker_price() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/ticker")
            .match_query(Matcher::UrlEncoded("markets".into(), "KRW-BTC".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"market":"KRW-BTC","trade_price":50000000.0,"timestamp":1700000000000}]"#)
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), None);
        let price = client.get_ticker_price("KRW-BTC").await.unwrap();

        assert_eq!(price, 50000000.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ticker_rejects_zero_price() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/ticker")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"market":"KRW-BTC","trade_price":0.0}]"#)
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), None);
        let err = client.get_ticker_price("KRW-BTC").await.unwrap_err();
        assert!(matches!(err, Error::ExternalFetch(_)));
    }

    #[tokio::test]
    async fn test_ticker_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/ticker")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), None);
        let err = client.get_ticker_price("KRW-BTC").await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_minute_candles_oldest_first() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/candles/minutes/1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("market".into(), "KRW-BTC".into()),
                Matcher::UrlEncoded("count".into(), "3".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"[{"market":"KRW-BTC","trade_price":103.0},
                    {"market":"KRW-BTC","trade_price":102.0},
                    {"market":"KRW-BTC","trade_price":101.0}]"#,
            )
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), None);
        let prices = client.fetch_recent_prices("KRW-BTC", 3).await.unwrap();

        assert_eq!(prices, vec![101.0, 102.0, 103.0]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_minute_candles_reject_zero_price() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/candles/minutes/1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"market":"KRW-BTC","trade_price":0.0}]"#)
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), None);
        let err = client.get_minute_candles("KRW-BTC", 1, 1).await.unwrap_err();
        assert!(matches!(err, Error::ExternalFetch(_)));
    }

    #[tokio::test]
    async fn test_get_accounts_parses_string_balances() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/accounts")
            .match_header("authorization", Matcher::Regex("^Bearer .+\\..+\\..+$".to_string()))
            .with_status(200)
            .with_body(
                r#"[{"currency":"KRW","balance":"1000000.0","locked":"0.0"},
                    {"currency":"BTC","balance":"0.5","locked":"0.0"}]"#,
            )
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), test_credentials());
        let balances = client.get_accounts().await.unwrap();

        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].currency, "KRW");
        assert_eq!(balances[0].amount, 1000000.0);
        assert_eq!(balances[1].amount, 0.5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_accounts_require_credentials() {
        let client = UpbitClient::new("http://127.0.0.1:1", None);
        let err = client.get_accounts().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_place_limit_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/orders")
            .match_body("market=KRW-BTC&ord_type=limit&price=50000.00&side=bid&volume=2.00000000")
            .with_status(201)
            .with_body(
                r#"{"uuid":"9ca023a5","side":"bid","ord_type":"limit","price":"50000.0",
                    "state":"wait","market":"KRW-BTC","volume":"2.0"}"#,
            )
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), test_credentials());
        let order = OrderRequest {
            market: "KRW-BTC".to_string(),
            side: OrderSide::Buy,
            price: 50000.0,
            volume: 2.0,
        };
        let confirmation = client.place_limit_order(&order).await.unwrap();

        assert_eq!(confirmation.id, "9ca023a5");
        assert_eq!(confirmation.state, "wait");
        assert_eq!(confirmation.volume, 2.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/orders")
            .with_status(400)
            .with_body(r#"{"error":{"name":"insufficient_funds_bid"}}"#)
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), test_credentials());
        let order = OrderRequest {
            market: "KRW-BTC".to_string(),
            side: OrderSide::Sell,
            price: 50000.0,
            volume: 2.0,
        };
        let err = client.place_limit_order(&order).await.unwrap_err();
        assert!(matches!(err, Error::OrderSubmission(_)));
    }

    #[tokio::test]
    async fn test_cancel_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/order")
            .match_query(Matcher::UrlEncoded("uuid".into(), "abc-123".into()))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), test_credentials());
        client.cancel_order("abc-123").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_markets() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/market/all")
            .match_query(Matcher::UrlEncoded("is_details".into(), "true".into()))
            .with_status(200)
            .with_body(
                r#"[{"market":"KRW-BTC","korean_name":"비트코인","english_name":"Bitcoin",
                     "market_event":{"warning":false,"caution":""}},
                    {"market":"KRW-XYZ","korean_name":"","english_name":"Xyz",
                     "market_event":{"warning":true,"caution":""}}]"#,
            )
            .create_async()
            .await;

        let client = UpbitClient::new(server.url(), None);
        let markets = client.get_markets().await.unwrap();
        assert_eq!(markets.len(), 2);
        assert_eq!(safe_markets(markets).len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires live API
    async fn test_get_ticker_price_live() {
        let client = UpbitClient::default();
        let price = client.get_ticker_price("KRW-BTC").await.unwrap();
        assert!(price > 0.0);
    }
}
