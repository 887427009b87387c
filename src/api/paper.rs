use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use super::Exchange;
use crate::models::{Balance, OrderConfirmation, OrderRequest};
use crate::{Error, Result};

enum PriceFeed {
    /// Prices handed out in order; fetching past the end is an error
    Scripted(VecDeque<f64>),
    /// Multiplicative random walk, `volatility` is the max relative move per tick
    RandomWalk {
        rng: StdRng,
        last: f64,
        volatility: f64,
    },
}

/// In-memory exchange for dry runs and tests
///
/// Orders are recorded, never filled, and balances never change.
pub struct PaperExchange {
    feed: Mutex<PriceFeed>,
    balances: Mutex<Vec<Balance>>,
    orders: Mutex<Vec<OrderRequest>>,
    price_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    fail_prices: AtomicBool,
    fail_orders: AtomicBool,
    price_delay_ms: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PaperExchange {
    fn with_feed(feed: PriceFeed) -> Self {
        Self {
            feed: Mutex::new(feed),
            balances: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
            price_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            fail_prices: AtomicBool::new(false),
            fail_orders: AtomicBool::new(false),
            price_delay_ms: AtomicU64::new(0),
        }
    }

    /// Exchange that returns `prices` one per fetch
    pub fn scripted(prices: impl IntoIterator<Item = f64>) -> Self {
        Self::with_feed(PriceFeed::Scripted(prices.into_iter().collect()))
    }

    /// Exchange with a seeded random-walk price feed
    pub fn random_walk(start_price: f64, volatility: f64, seed: u64) -> Self {
        Self::with_feed(PriceFeed::RandomWalk {
            rng: StdRng::seed_from_u64(seed),
            last: start_price,
            volatility: volatility.abs(),
        })
    }

    pub fn with_balance(self, currency: &str, amount: f64) -> Self {
        lock(&self.balances).push(Balance {
            currency: currency.to_string(),
            amount,
        });
        self
    }

    /// Append prices to a scripted feed (no-op for random walks)
    pub fn push_prices(&self, prices: impl IntoIterator<Item = f64>) {
        if let PriceFeed::Scripted(queue) = &mut *lock(&self.feed) {
            queue.extend(prices);
        }
    }

    pub fn set_fail_prices(&self, fail: bool) {
        self.fail_prices.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    /// Make every price fetch take `delay` (simulates a slow API)
    pub fn set_price_delay(&self, delay: Duration) {
        self.price_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Orders accepted so far
    pub fn orders(&self) -> Vec<OrderRequest> {
        lock(&self.orders).clone()
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn fetch_current_price(&self, market: &str) -> Result<f64> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.price_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        self.next_price(market)
    }

    async fn fetch_recent_prices(&self, market: &str, count: usize) -> Result<Vec<f64>> {
        (0..count).map(|_| self.next_price(market)).collect()
    }

    async fn fetch_balance(&self) -> Result<Vec<Balance>> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.balances).clone())
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation> {
        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(Error::OrderSubmission("paper exchange rejected order".to_string()));
        }

        lock(&self.orders).push(order.clone());

        tracing::info!(
            market = %order.market,
            side = ?order.side,
            price = order.price,
            volume = order.volume,
            "Paper order recorded"
        );

        Ok(OrderConfirmation {
            id: Uuid::new_v4().to_string(),
            market: order.market.clone(),
            side: order.side,
            price: order.price,
            volume: order.volume,
            state: "wait".to_string(),
            timestamp: Utc::now(),
        })
    }
}

impl PaperExchange {
    fn next_price(&self, market: &str) -> Result<f64> {
        if self.fail_prices.load(Ordering::SeqCst) {
            return Err(Error::ExternalFetch(format!(
                "paper price feed unavailable for {}",
                market
            )));
        }

        match &mut *lock(&self.feed) {
            PriceFeed::Scripted(queue) => queue.pop_front().ok_or_else(|| {
                Error::ExternalFetch(format!("paper price feed exhausted for {}", market))
            }),
            PriceFeed::RandomWalk {
                rng,
                last,
                volatility,
            } => {
                let change = if *volatility > 0.0 {
                    rng.gen_range(-*volatility..*volatility)
                } else {
                    0.0
                };
                *last = (*last * (1.0 + change)).max(f64::MIN_POSITIVE);
                Ok(*last)
            }
        }
    }
}
