// Risk management module
pub mod manager;

pub use manager::{RiskBreach, RiskManager, RiskParameters, BASE_RISK_FRACTION};
