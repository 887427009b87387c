use serde::{Deserialize, Serialize};

use crate::models::TradeSignal;
use crate::{Error, Result};

/// Share of the balance put at risk per trade, independent of configuration
pub const BASE_RISK_FRACTION: f64 = 0.02;

/// Risk limits, fixed at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    pub max_position_size: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_drawdown_pct: f64,
    pub daily_limit: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            max_position_size: 1000.0, // Volume cap per order
            stop_loss_pct: 2.0,        // -2% from entry
            take_profit_pct: 3.0,      // +3% from entry
            max_drawdown_pct: 5.0,
            daily_limit: 10000.0,
        }
    }
}

impl RiskParameters {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max_position_size", self.max_position_size),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("max_drawdown_pct", self.max_drawdown_pct),
            ("daily_limit", self.daily_limit),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Why an open position should be exited
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskBreach {
    StopLoss { loss_pct: f64 },
    TakeProfit { profit_pct: f64 },
    InvalidEntry,
}

/// Sizes positions and checks open-position exits
#[derive(Debug, Clone, Default)]
pub struct RiskManager {
    params: RiskParameters,
}

impl RiskManager {
    pub fn new(params: RiskParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RiskParameters {
        &self.params
    }

    /// Convert a signal and account balance into an order volume
    ///
    /// 1. 2% of the balance, scaled by signal confidence
    /// 2. capped at `max_position_size`
    /// 3. capped so a stop-loss hit costs at most 2% of the balance
    ///
    /// Never negative. A result of 0 means "do not trade this cycle".
    pub fn size_position(&self, signal: &TradeSignal, balance: f64, current_price: f64) -> f64 {
        if !balance.is_finite() || balance <= 0.0 {
            return 0.0;
        }

        let base_size = balance * BASE_RISK_FRACTION;
        let mut size = base_size * signal.confidence;

        if size > self.params.max_position_size {
            size = self.params.max_position_size;
        }

        let risk_amount = current_price * (self.params.stop_loss_pct / 100.0);
        if risk_amount > 0.0 {
            let max_size_by_risk = base_size / risk_amount;
            if size > max_size_by_risk {
                size = max_size_by_risk;
            }
        }

        if size.is_nan() {
            return 0.0;
        }
        size.max(0.0)
    }

    /// `true` when the position is safe to keep holding
    pub fn check_risk(&self, position: f64, current_price: f64, entry_price: f64) -> bool {
        self.check_risk_detailed(position, current_price, entry_price)
            .is_ok()
    }

    /// Same as [`check_risk`](Self::check_risk) but reports which limit tripped
    ///
    /// Take-profit is treated like a breach: both mean "exit now".
    pub fn check_risk_detailed(
        &self,
        _position: f64,
        current_price: f64,
        entry_price: f64,
    ) -> std::result::Result<(), RiskBreach> {
        if entry_price.is_nan() || entry_price <= 0.0 {
            return Err(RiskBreach::InvalidEntry);
        }

        let loss_pct = (entry_price - current_price) / entry_price * 100.0;
        if loss_pct > self.params.stop_loss_pct {
            return Err(RiskBreach::StopLoss { loss_pct });
        }

        let profit_pct = (current_price - entry_price) / entry_price * 100.0;
        if profit_pct > self.params.take_profit_pct {
            return Err(RiskBreach::TakeProfit { profit_pct });
        }

        Ok(())
    }
}
