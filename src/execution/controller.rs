use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::PriceWindow;
use crate::api::Exchange;
use crate::models::{OrderConfirmation, OrderRequest, OrderSide, SignalKind, TradeSignal};
use crate::risk::{RiskManager, RiskParameters};
use crate::strategy::{SignalGenerator, Strategy, StrategyParameters};
use crate::{Error, Result};

/// Why a cycle ended without an order
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InsufficientData { have: usize, need: usize },
    Hold,
    NoBalance,
    ZeroVolume,
}

/// Result of one evaluation cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    OrderSubmitted {
        signal: TradeSignal,
        confirmation: OrderConfirmation,
    },
}

/// Snapshot returned by [`TradingController::status`]
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub running: bool,
    pub market: String,
    pub strategy: StrategyParameters,
    pub window_len: usize,
}

/// Market selection for the controller
#[derive(Debug, Clone)]
pub struct TradingTarget {
    pub market: String,
    pub settlement_currency: String,
}

/// Everything guarded by the controller lock
struct ControllerState {
    running: bool,
    cancel: Option<CancellationToken>,
    /// Bumped on every start so a finished loop can tell whether it is still current
    generation: u64,
    window: PriceWindow,
}

struct Inner {
    exchange: Arc<dyn Exchange>,
    target: TradingTarget,
    generator: SignalGenerator,
    risk: RiskManager,
    shutdown: CancellationToken,
    state: Mutex<ControllerState>,
}

/// Drives periodic evaluation: fetch price, analyze, size, submit
///
/// Idle until [`start`](Self::start), back to Idle on [`stop`](Self::stop)
/// or when the shutdown token is cancelled. Cheap to clone; clones share state.
///
/// A cycle holds the lock from price fetch through order submission, so cycles
/// never overlap and status reads never see a half-updated window. `stop` waits
/// for an in-flight cycle to release the lock; once it returns no timer cycle
/// fetches or submits anything, even one whose tick had already fired.
#[derive(Clone)]
pub struct TradingController {
    inner: Arc<Inner>,
}

impl TradingController {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        target: TradingTarget,
        strategy: StrategyParameters,
        risk: RiskParameters,
    ) -> Self {
        Self::with_shutdown(exchange, target, strategy, risk, CancellationToken::new())
    }

    /// Like [`new`](Self::new); cancelling `shutdown` stops any running loop
    pub fn with_shutdown(
        exchange: Arc<dyn Exchange>,
        target: TradingTarget,
        strategy: StrategyParameters,
        risk: RiskParameters,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                exchange,
                target,
                generator: SignalGenerator::new(strategy),
                risk: RiskManager::new(risk),
                shutdown,
                state: Mutex::new(ControllerState {
                    running: false,
                    cancel: None,
                    generation: 0,
                    window: PriceWindow::new(),
                }),
            }),
        }
    }

    /// Start the periodic loop. No-op if already running.
    ///
    /// The first cycle runs one `interval` after the call.
    pub async fn start(&self, interval: Duration) {
        if interval.is_zero() {
            tracing::error!("Refusing to start trading with a zero interval");
            return;
        }

        let mut state = self.inner.state.lock().await;

        if state.running {
            tracing::info!("Trading bot is already running");
            return;
        }

        let token = self.inner.shutdown.child_token();
        state.running = true;
        state.cancel = Some(token.clone());
        state.generation += 1;
        let generation = state.generation;
        drop(state);

        tracing::info!(
            market = %self.inner.target.market,
            interval_secs = interval.as_secs_f64(),
            strategy = self.inner.generator.name(),
            "Starting trading"
        );

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run_loop(interval, token, generation).await;
        });
    }

    /// Stop the periodic loop. No-op if idle.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;

        if !state.running {
            tracing::debug!("Trading bot is not running");
            return;
        }

        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
        state.running = false;

        tracing::info!("Trading stop requested");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    pub async fn status(&self) -> ControllerStatus {
        let state = self.inner.state.lock().await;
        ControllerStatus {
            running: state.running,
            market: self.inner.target.market.clone(),
            strategy: self.inner.generator.params().clone(),
            window_len: state.window.len(),
        }
    }

    /// Copy of the current price window (newest last)
    pub async fn window_prices(&self) -> Vec<f64> {
        self.inner.state.lock().await.window.as_slice().to_vec()
    }

    /// Run a single evaluation cycle now, independent of the timer
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.inner.run_cycle().await
    }

    /// Seed the window from recent exchange history so the next cycle can analyze
    ///
    /// Fetches one price fewer than the generator needs, leaving the last sample
    /// to the cycle's own fetch. Returns the number of prices appended.
    pub async fn warm_up(&self) -> Result<usize> {
        let mut state = self.inner.state.lock().await;
        let need = self.inner.generator.min_samples_required();
        let missing = need.saturating_sub(state.window.len() + 1);
        if missing == 0 {
            return Ok(0);
        }

        let prices = self
            .inner
            .exchange
            .fetch_recent_prices(&self.inner.target.market, missing)
            .await
            .map_err(|e| Error::ExternalFetch(format!("recent prices: {}", e)))?;

        for &price in &prices {
            state
                .window
                .append(price)
                .map_err(|e| Error::ExternalFetch(format!("price history returned {}", e)))?;
        }

        tracing::info!(
            market = %self.inner.target.market,
            appended = prices.len(),
            window_len = state.window.len(),
            "Price window warmed up"
        );
        Ok(prices.len())
    }

    /// Check an open position against stop-loss and take-profit using the latest window price
    ///
    /// Returns `true` when the position is safe to keep.
    pub async fn evaluate_position(&self, entry_price: f64, volume: f64) -> Result<bool> {
        let state = self.inner.state.lock().await;
        let current_price = state.window.latest().ok_or(Error::InsufficientData {
            have: 0,
            need: 1,
        })?;

        match self
            .inner
            .risk
            .check_risk_detailed(volume, current_price, entry_price)
        {
            Ok(()) => Ok(true),
            Err(breach) => {
                tracing::warn!(
                    entry_price,
                    current_price,
                    volume,
                    breach = ?breach,
                    "Position outside risk limits, exit recommended"
                );
                Ok(false)
            }
        }
    }
}

impl Inner {
    async fn run_loop(&self, interval: Duration, token: CancellationToken, generation: u64) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.run_scheduled_cycle(&token).await;
                }
            }
        }

        // Cancelled from outside (shutdown token) rather than through stop()
        let mut state = self.state.lock().await;
        if state.generation == generation && state.running {
            state.running = false;
            state.cancel = None;
        }
        drop(state);

        tracing::info!("Trading stopped");
    }

    async fn run_cycle(&self) -> Result<CycleOutcome> {
        let mut state = self.state.lock().await;
        self.logged_cycle(&mut state).await
    }

    /// Timer-driven cycle; skipped when stop() won the lock after the tick fired
    async fn run_scheduled_cycle(&self, token: &CancellationToken) {
        let mut state = self.state.lock().await;
        if token.is_cancelled() {
            tracing::debug!("Trading stopped before the cycle could run");
            return;
        }
        // Errors are logged inside and never end the loop
        let _ = self.logged_cycle(&mut state).await;
    }

    async fn logged_cycle(&self, state: &mut ControllerState) -> Result<CycleOutcome> {
        let result = self.evaluate(state).await;

        match &result {
            Ok(CycleOutcome::Skipped(SkipReason::InsufficientData { have, need })) => {
                tracing::info!(
                    have,
                    need,
                    "Not enough price data for analysis"
                );
            }
            Ok(CycleOutcome::Skipped(SkipReason::Hold)) => {
                tracing::debug!("No trade signal, holding position");
            }
            Ok(CycleOutcome::Skipped(SkipReason::NoBalance)) => {
                tracing::error!(
                    currency = %self.target.settlement_currency,
                    "No balance available for trading"
                );
            }
            Ok(CycleOutcome::Skipped(SkipReason::ZeroVolume)) => {
                tracing::debug!("Calculated trade volume is too small");
            }
            Ok(CycleOutcome::OrderSubmitted { signal, confirmation }) => {
                tracing::info!(
                    order_id = %confirmation.id,
                    market = %confirmation.market,
                    side = ?confirmation.side,
                    price = signal.price,
                    volume = signal.volume,
                    confidence = signal.confidence,
                    "Order executed"
                );
            }
            Err(e) => {
                tracing::error!(market = %self.target.market, "Trade cycle failed: {}", e);
            }
        }

        result
    }

    /// One cycle body; the caller holds the state lock throughout
    async fn evaluate(&self, state: &mut ControllerState) -> Result<CycleOutcome> {
        let market = &self.target.market;
        tracing::debug!(market = %market, "Starting trade loop");

        let current_price = self
            .exchange
            .fetch_current_price(market)
            .await
            .map_err(|e| Error::ExternalFetch(format!("price: {}", e)))?;
        tracing::debug!(price = current_price, "Current price");

        state
            .window
            .append(current_price)
            .map_err(|e| Error::ExternalFetch(format!("price feed returned {}", e)))?;

        let need = self.generator.min_samples_required();
        let have = state.window.len();
        if have < need {
            return Ok(CycleOutcome::Skipped(SkipReason::InsufficientData { have, need }));
        }

        let mut signal = match self.generator.analyze(state.window.as_slice()) {
            Ok(signal) => signal,
            Err(Error::InsufficientData { have, need }) => {
                return Ok(CycleOutcome::Skipped(SkipReason::InsufficientData { have, need }))
            }
            Err(e) => return Err(e),
        };

        if signal.kind == SignalKind::Hold {
            return Ok(CycleOutcome::Skipped(SkipReason::Hold));
        }

        let balances = self
            .exchange
            .fetch_balance()
            .await
            .map_err(|e| Error::ExternalFetch(format!("balance: {}", e)))?;

        let balance = balances
            .iter()
            .find(|b| b.currency == self.target.settlement_currency)
            .map(|b| b.amount)
            .unwrap_or(0.0);
        if balance.is_nan() || balance <= 0.0 {
            return Ok(CycleOutcome::Skipped(SkipReason::NoBalance));
        }
        tracing::debug!(balance, currency = %self.target.settlement_currency, "Available balance");

        let volume = self.risk.size_position(&signal, balance, current_price);
        if volume <= 0.0 {
            return Ok(CycleOutcome::Skipped(SkipReason::ZeroVolume));
        }
        signal.volume = volume;

        let side = OrderSide::try_from(signal.kind)?;
        let order = OrderRequest {
            market: market.clone(),
            side,
            price: signal.price,
            volume: signal.volume,
        };

        let confirmation = self
            .exchange
            .submit_order(&order)
            .await
            .map_err(|e| match e {
                Error::OrderSubmission(msg) => Error::OrderSubmission(msg),
                other => Error::OrderSubmission(other.to_string()),
            })?;

        Ok(CycleOutcome::OrderSubmitted {
            signal,
            confirmation,
        })
    }
}
