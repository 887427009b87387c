pub mod auth;
pub mod paper;
pub mod upbit;

pub use paper::PaperExchange;
pub use upbit::{is_market_safe, safe_markets, UpbitClient, UpbitCredentials};

use async_trait::async_trait;

use crate::models::{Balance, OrderConfirmation, OrderRequest};
use crate::Result;

/// Price, balance and order transport used by the trading controller
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Latest traded price for `market`. Must be strictly positive or an error.
    async fn fetch_current_price(&self, market: &str) -> Result<f64>;

    /// Up to `count` recent closing prices for `market`, oldest first
    async fn fetch_recent_prices(&self, market: &str, count: usize) -> Result<Vec<f64>>;

    /// All account balances
    async fn fetch_balance(&self) -> Result<Vec<Balance>>;

    /// Submit a limit order. The controller does not wait for fills.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation>;
}
