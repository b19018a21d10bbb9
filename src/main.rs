// =============================================================================
// Borealis Signal Nexus — Main Entry Point
// =============================================================================
//
// Streams 1-minute bars from the exchange feed, rolls them up into the
// configured timeframes, and publishes scored signals plus per-symbol
// consensus snapshots to the alert sinks.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod alerts;
mod dispatcher;
mod indicators;
mod market_data;
mod runtime_config;
mod signals;
mod sr;
mod timegrid;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::alerts::Notifier;
use crate::dispatcher::Dispatcher;
use crate::market_data::kline_stream;
use crate::runtime_config::RuntimeConfig;

/// Backpressure bound between the feed reader and the pipeline task.
const FEED_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Borealis Signal Nexus — Starting Up              ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("BOREALIS_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("BOREALIS_SYMBOLS") {
        config.exchange.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.exchange.symbols.is_empty() {
        config.exchange.symbols = runtime_config::ExchangeConfig::default().symbols;
    }

    let timeframe_names: Vec<String> = config
        .target_timeframes()
        .iter()
        .map(|tf| tf.to_string())
        .collect();
    info!(
        symbols = ?config.exchange.symbols,
        market = %config.exchange.market_type,
        timeframes = ?timeframe_names,
        "Configured signal pipeline"
    );

    // ── 2. Notifier sinks ────────────────────────────────────────────────
    let notifier = Arc::new(Notifier::from_config(&config.alerts));
    if !notifier.is_active() {
        warn!("No alert channel configured — signals will only be logged");
    }

    // ── 3. Feed stream ───────────────────────────────────────────────────
    let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
    let feed_symbols = config.exchange.symbols.clone();
    let market_type = config.exchange.market_type.clone();
    tokio::spawn(async move {
        kline_stream::run_kline_stream(feed_symbols, market_type, tx).await;
    });

    // ── 4. Pipeline until shutdown ───────────────────────────────────────
    let pipeline = Dispatcher::new(&config, notifier);
    tokio::select! {
        _ = pipeline.run(rx) => {
            warn!("Pipeline stopped on its own");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Shutdown signal received — stopping gracefully");
        }
    }

    info!("Borealis Signal Nexus shut down complete.");
    Ok(())
}
