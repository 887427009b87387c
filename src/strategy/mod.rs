// Trading strategy module
pub mod signals;

pub use signals::{analyze, calculate_confidence, IndicatorSnapshot, SignalGenerator, StrategyParameters};

use crate::models::TradeSignal;
use crate::Result;

/// Base trait for signal-producing strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal from the price window (newest last)
    fn analyze(&self, prices: &[f64]) -> Result<TradeSignal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum samples required before `analyze` may run
    fn min_samples_required(&self) -> usize;
}
