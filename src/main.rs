use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use signalbot::api::{safe_markets, Exchange, PaperExchange, UpbitClient};
use signalbot::config::AppConfig;
use signalbot::execution::{CycleOutcome, TradingController, TradingTarget};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const PAPER_START_PRICE: f64 = 50_000_000.0;
const PAPER_VOLATILITY: f64 = 0.01;
const PAPER_BALANCE: f64 = 1_000_000.0;

#[derive(Parser)]
#[command(name = "signalbot", about = "MA/RSI/Bollinger signal trading bot")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the trading loop until Ctrl+C
    Run {
        /// Seconds between cycles (overrides config)
        #[arg(long)]
        interval: Option<u64>,

        /// Trade against an in-memory random-walk exchange
        #[arg(long)]
        paper: bool,
    },
    /// Run a single evaluation cycle and exit
    Once {
        #[arg(long)]
        paper: bool,
    },
    /// List markets without exchange warnings
    Markets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.json);

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Command::Run { interval, paper } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.trading.interval());
            if interval.is_zero() {
                anyhow::bail!("--interval must be positive");
            }
            run(&config, interval, paper).await
        }
        Command::Once { paper } => once(&config, paper).await,
        Command::Markets => list_markets(&config).await,
    }
}

fn setup_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("signalbot=info"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_exchange(config: &AppConfig, paper: bool) -> Arc<dyn Exchange> {
    if paper {
        tracing::info!("Using paper exchange");
        return Arc::new(
            PaperExchange::random_walk(PAPER_START_PRICE, PAPER_VOLATILITY, rand::random())
                .with_balance(&config.trading.settlement_currency, PAPER_BALANCE),
        );
    }

    let credentials = config.exchange.credentials();
    if credentials.is_none() {
        tracing::warn!("Upbit credentials not set; balance and order requests will fail");
    }
    Arc::new(UpbitClient::new(config.exchange.server_url.clone(), credentials))
}

fn build_controller(
    config: &AppConfig,
    exchange: Arc<dyn Exchange>,
    shutdown: CancellationToken,
) -> TradingController {
    TradingController::with_shutdown(
        exchange,
        TradingTarget {
            market: config.trading.market.clone(),
            settlement_currency: config.trading.settlement_currency.clone(),
        },
        config.strategy.clone(),
        config.risk.clone(),
        shutdown,
    )
}

async fn run(config: &AppConfig, interval: Duration, paper: bool) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let controller = build_controller(config, build_exchange(config, paper), shutdown.clone());

    tracing::info!(
        market = %config.trading.market,
        interval_secs = interval.as_secs(),
        short_ma = config.strategy.short_ma_period,
        long_ma = config.strategy.long_ma_period,
        rsi_period = config.strategy.rsi_period,
        bb_period = config.strategy.bb_period,
        max_position_size = config.risk.max_position_size,
        stop_loss_pct = config.risk.stop_loss_pct,
        "Configuration"
    );

    if let Err(e) = controller.warm_up().await {
        tracing::warn!(error = %e, "Could not preload price history, warming up from live ticks");
    }

    controller.start(interval).await;
    tracing::info!("Press Ctrl+C to stop...");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Received Ctrl+C, shutting down...");

    controller.stop().await;
    shutdown.cancel();

    let status = controller.status().await;
    tracing::info!(window_len = status.window_len, "Bot stopped");
    Ok(())
}

async fn once(config: &AppConfig, paper: bool) -> anyhow::Result<()> {
    let controller = build_controller(config, build_exchange(config, paper), CancellationToken::new());
    controller
        .warm_up()
        .await
        .context("Failed to load recent prices")?;

    match controller.run_cycle().await? {
        CycleOutcome::Skipped(reason) => println!("Skipped: {:?}", reason),
        CycleOutcome::OrderSubmitted { signal, confirmation } => println!(
            "Order {} {:?} {} @ {} (confidence {:.3})",
            confirmation.id, confirmation.side, signal.volume, signal.price, signal.confidence
        ),
    }
    Ok(())
}

async fn list_markets(config: &AppConfig) -> anyhow::Result<()> {
    let client = UpbitClient::new(config.exchange.server_url.clone(), None);
    let markets = safe_markets(client.get_markets().await?);

    println!("=== Safe markets ({}) ===", markets.len());
    for market in markets {
        println!("{:<12} {:<20} {}", market.market, market.english_name, market.korean_name);
    }
    Ok(())
}
