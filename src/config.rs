//! Configuration loading and validation
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! `SIGNALBOT__SECTION__KEY` environment variables, then the Upbit
//! `UPBIT_OPEN_API_*` variables for the exchange section.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::api::upbit::UPBIT_API_BASE;
use crate::api::UpbitCredentials;
use crate::risk::RiskParameters;
use crate::strategy::StrategyParameters;
use crate::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub strategy: StrategyParameters,
    #[serde(default)]
    pub risk: RiskParameters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            access_key: None,
            secret_key: None,
        }
    }
}

impl ExchangeConfig {
    /// Credentials when both keys are present and non-empty
    pub fn credentials(&self) -> Option<UpbitCredentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) if !access_key.is_empty() && !secret_key.is_empty() => {
                Some(UpbitCredentials {
                    access_key: access_key.clone(),
                    secret_key: secret_key.clone(),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Market code, e.g. `KRW-BTC`
    #[serde(default = "default_market")]
    pub market: String,
    /// Currency the balance is read from
    #[serde(default = "default_settlement_currency")]
    pub settlement_currency: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            market: default_market(),
            settlement_currency: default_settlement_currency(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl TradingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_server_url() -> String {
    UPBIT_API_BASE.to_string()
}

fn default_market() -> String {
    "KRW-BTC".to_string()
}

fn default_settlement_currency() -> String {
    "KRW".to_string()
}

fn default_interval_secs() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("SIGNALBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(format!("failed to build configuration: {}", e)))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("failed to parse configuration: {}", e)))?;

        config.apply_upbit_env();
        config.validate()?;

        Ok(config)
    }

    /// Upbit's conventional variable names override the exchange section
    fn apply_upbit_env(&mut self) {
        if let Ok(url) = std::env::var("UPBIT_OPEN_API_SERVER_URL") {
            if !url.is_empty() {
                self.exchange.server_url = url;
            }
        }
        if let Ok(key) = std::env::var("UPBIT_OPEN_API_ACCESS_KEY") {
            self.exchange.access_key = Some(key);
        }
        if let Ok(key) = std::env::var("UPBIT_OPEN_API_SECRET_KEY") {
            self.exchange.secret_key = Some(key);
        }
        if let Ok(market) = std::env::var("TRADING_MARKET") {
            if !market.is_empty() {
                self.trading.market = market;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.trading.market.is_empty() {
            return Err(Error::Config("trading.market must not be empty".to_string()));
        }
        if self.trading.settlement_currency.is_empty() {
            return Err(Error::Config(
                "trading.settlement_currency must not be empty".to_string(),
            ));
        }
        if self.trading.interval_secs == 0 {
            return Err(Error::Config("trading.interval_secs must be positive".to_string()));
        }

        self.strategy.validate()?;
        self.risk.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = AppConfig::default();

        assert_eq!(config.exchange.server_url, "https://api.upbit.com");
        assert_eq!(config.trading.market, "KRW-BTC");
        assert_eq!(config.trading.settlement_currency, "KRW");
        assert_eq!(config.trading.interval(), Duration::from_secs(30));
        assert_eq!(config.strategy, StrategyParameters::default());
        assert_eq!(config.risk.stop_loss_pct, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("signalbot-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[trading]
market = "KRW-ETH"
interval_secs = 60

[strategy]
short_ma_period = 5
long_ma_period = 15

[risk]
max_position_size = 10.0
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.trading.market, "KRW-ETH");
        assert_eq!(config.trading.interval_secs, 60);
        assert_eq!(config.strategy.short_ma_period, 5);
        assert_eq!(config.strategy.long_ma_period, 15);
        // Unspecified fields keep their defaults
        assert_eq!(config.strategy.rsi_period, 14);
        assert_eq!(config.risk.max_position_size, 10.0);
        assert_eq!(config.risk.take_profit_pct, 3.0);
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let mut config = AppConfig::default();
        config.trading.interval_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_require_both_keys() {
        let mut exchange = ExchangeConfig::default();
        assert!(exchange.credentials().is_none());

        exchange.access_key = Some("access".to_string());
        assert!(exchange.credentials().is_none());

        exchange.secret_key = Some("secret".to_string());
        assert!(exchange.credentials().is_some());

        exchange.secret_key = Some(String::new());
        assert!(exchange.credentials().is_none());
    }
}
