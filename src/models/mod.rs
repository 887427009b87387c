use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Classified trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalKind {
    Hold,
    Buy,
    Sell,
}

/// Signal produced by the generator and sized by the risk manager
///
/// `volume` stays 0 until the risk manager fills it in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeSignal {
    pub kind: SignalKind,
    pub price: f64,
    pub volume: f64,
    pub confidence: f64,
}

impl TradeSignal {
    pub fn hold(price: f64) -> Self {
        Self {
            kind: SignalKind::Hold,
            price,
            volume: 0.0,
            confidence: 0.0,
        }
    }

    pub fn is_directional(&self) -> bool {
        self.kind != SignalKind::Hold
    }
}

/// Order side on the exchange
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Upbit wire name: `bid` for buy, `ask` for sell
    pub fn as_upbit_side(&self) -> &'static str {
        match self {
            OrderSide::Buy => "bid",
            OrderSide::Sell => "ask",
        }
    }
}

impl TryFrom<SignalKind> for OrderSide {
    type Error = Error;

    fn try_from(kind: SignalKind) -> Result<Self> {
        match kind {
            SignalKind::Buy => Ok(OrderSide::Buy),
            SignalKind::Sell => Ok(OrderSide::Sell),
            SignalKind::Hold => Err(Error::InvalidSignal(
                "hold signal cannot be turned into an order".to_string(),
            )),
        }
    }
}

/// Account balance in one currency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub currency: String,
    pub amount: f64,
}

/// Limit order handed to the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub market: String,
    pub side: OrderSide,
    pub price: f64,
    pub volume: f64,
}

/// Exchange acknowledgement of a submitted order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub id: String,
    pub market: String,
    pub side: OrderSide,
    pub price: f64,
    pub volume: f64,
    pub state: String,
    pub timestamp: DateTime<Utc>,
}

/// Exchange market listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Market {
    pub market: String,
    #[serde(default)]
    pub korean_name: String,
    #[serde(default)]
    pub english_name: String,
    #[serde(default)]
    pub market_event: MarketEvent,
}

/// Exchange-issued warnings attached to a market
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketEvent {
    #[serde(default)]
    pub warning: bool,
    #[serde(default)]
    pub caution: String,
}
