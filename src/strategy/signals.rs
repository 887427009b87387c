use serde::{Deserialize, Serialize};

use crate::indicators::{bollinger_bands, moving_average, rsi};
use crate::models::{SignalKind, TradeSignal};
use crate::strategy::Strategy;
use crate::{Error, Result};

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

const MA_WEIGHT: f64 = 0.4;
const RSI_WEIGHT: f64 = 0.3;
const BAND_WEIGHT: f64 = 0.3;

/// Indicator periods used by the signal generator
///
/// Fixed at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParameters {
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std_dev_multiplier: f64,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            short_ma_period: 10,
            long_ma_period: 20,
            rsi_period: 14,
            bb_period: 20,
            bb_std_dev_multiplier: 2.0,
        }
    }
}

impl StrategyParameters {
    /// Samples needed before the generator may run: `max(long MA, BB, RSI period) + 1`
    ///
    /// RSI needs `rsi_period + 1` prices for its deltas; below that it reads 0,
    /// which would otherwise pass for an oversold market.
    pub fn min_samples_required(&self) -> usize {
        self.long_ma_period.max(self.bb_period).max(self.rsi_period) + 1
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("short_ma_period", self.short_ma_period),
            ("long_ma_period", self.long_ma_period),
            ("rsi_period", self.rsi_period),
            ("bb_period", self.bb_period),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(Error::Config(format!("{} must be positive", name)));
            }
        }

        if !(self.bb_std_dev_multiplier > 0.0 && self.bb_std_dev_multiplier.is_finite()) {
            return Err(Error::Config(format!(
                "bb_std_dev_multiplier must be positive, got {}",
                self.bb_std_dev_multiplier
            )));
        }

        if self.short_ma_period >= self.long_ma_period {
            return Err(Error::Config(format!(
                "short_ma_period ({}) must be below long_ma_period ({})",
                self.short_ma_period, self.long_ma_period
            )));
        }

        Ok(())
    }
}

/// Indicator values derived from the window for one evaluation
///
/// Recomputed on every call, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub short_ma: f64,
    pub long_ma: f64,
    pub rsi: f64,
    pub bb_middle: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
}

impl IndicatorSnapshot {
    pub fn compute(prices: &[f64], params: &StrategyParameters) -> Self {
        let bands = bollinger_bands(prices, params.bb_period, params.bb_std_dev_multiplier);

        Self {
            short_ma: moving_average(prices, params.short_ma_period),
            long_ma: moving_average(prices, params.long_ma_period),
            rsi: rsi(prices, params.rsi_period),
            bb_middle: bands.middle,
            bb_upper: bands.upper,
            bb_lower: bands.lower,
        }
    }

    pub fn is_buy(&self, price: f64) -> bool {
        self.short_ma > self.long_ma && self.rsi < RSI_OVERSOLD && price < self.bb_lower
    }

    pub fn is_sell(&self, price: f64) -> bool {
        self.short_ma < self.long_ma && self.rsi > RSI_OVERBOUGHT && price > self.bb_upper
    }
}

/// Combines MA crossover, RSI extremes and Bollinger breakouts into a signal
///
/// Buy: short MA above long MA, RSI oversold and price under the lower band.
/// Sell: short MA below long MA, RSI overbought and price over the upper band.
/// Anything else holds.
#[derive(Debug, Clone, Default)]
pub struct SignalGenerator {
    params: StrategyParameters,
}

impl SignalGenerator {
    pub fn new(params: StrategyParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StrategyParameters {
        &self.params
    }
}

impl Strategy for SignalGenerator {
    fn analyze(&self, prices: &[f64]) -> Result<TradeSignal> {
        analyze(prices, &self.params)
    }

    fn name(&self) -> &str {
        "MA/RSI/Bollinger"
    }

    fn min_samples_required(&self) -> usize {
        self.params.min_samples_required()
    }
}

/// Evaluate the latest price in `prices` against the indicator set
///
/// Buy is checked first and a matching sell condition overrides it
/// (last match wins). With consistent indicator math the two cannot both hold.
pub fn analyze(prices: &[f64], params: &StrategyParameters) -> Result<TradeSignal> {
    let need = params.min_samples_required();
    let current_price = match prices.last() {
        Some(&price) if prices.len() >= need => price,
        _ => {
            return Err(Error::InsufficientData {
                have: prices.len(),
                need,
            })
        }
    };

    let snapshot = IndicatorSnapshot::compute(prices, params);
    let mut signal = TradeSignal::hold(current_price);

    if snapshot.is_buy(current_price) {
        signal.kind = SignalKind::Buy;
        signal.confidence = calculate_confidence(
            snapshot.short_ma,
            snapshot.long_ma,
            snapshot.rsi,
            current_price,
            snapshot.bb_lower,
        );
    }

    if snapshot.is_sell(current_price) {
        signal.kind = SignalKind::Sell;
        signal.confidence = calculate_confidence(
            snapshot.short_ma,
            snapshot.long_ma,
            snapshot.rsi,
            current_price,
            snapshot.bb_upper,
        );
    }

    tracing::debug!(
        price = current_price,
        short_ma = snapshot.short_ma,
        long_ma = snapshot.long_ma,
        rsi = snapshot.rsi,
        bb_upper = snapshot.bb_upper,
        bb_lower = snapshot.bb_lower,
        kind = ?signal.kind,
        confidence = signal.confidence,
        "Signal analysis"
    );

    Ok(signal)
}

/// Weighted signal strength in `[0, 1]`
///
/// `0.4 * MA divergence + 0.3 * RSI extremity + 0.3 * band breach`.
/// A zero `long_ma` or `band` saturates its term instead of dividing by zero.
pub fn calculate_confidence(short_ma: f64, long_ma: f64, rsi: f64, price: f64, band: f64) -> f64 {
    let ma_signal = relative_gap(short_ma, long_ma);

    let rsi_signal = if rsi < RSI_OVERSOLD {
        (RSI_OVERSOLD - rsi) / 30.0
    } else if rsi > RSI_OVERBOUGHT {
        (rsi - RSI_OVERBOUGHT) / 30.0
    } else {
        0.0
    };

    let band_signal = relative_gap(price, band);

    let confidence = ma_signal * MA_WEIGHT + rsi_signal * RSI_WEIGHT + band_signal * BAND_WEIGHT;
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

/// `|value - reference| / |reference|`, infinite when the reference is zero
fn relative_gap(value: f64, reference: f64) -> f64 {
    let gap = (value - reference).abs();
    if reference == 0.0 {
        if gap == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        gap / reference.abs()
    }
}
