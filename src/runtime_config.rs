// =============================================================================
// Runtime Configuration — engine settings with env interpolation + atomic save
// =============================================================================
//
// Every tunable parameter lives here. All fields carry serde defaults so that
// adding new fields never breaks loading an older config file, and `${NAME}`
// references in the file are replaced from the environment before parsing
// (unresolved names pass through unchanged, so secrets can stay optional).
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::IndicatorParams;
use crate::signals::SignalThresholds;
use crate::sr::SrParams;
use crate::types::Timeframe;

const ENV_VAR_PATTERN: &str = r"\$\{([A-Z0-9_]+)\}";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_market_type() -> String {
    "spot".to_string()
}

fn default_adx_trend_threshold() -> f64 {
    20.0
}

fn default_score_threshold() -> u32 {
    70
}

fn default_timeframes() -> Vec<TimeframeConfig> {
    [Timeframe::M15, Timeframe::H1, Timeframe::H4]
        .into_iter()
        .map(|tf| TimeframeConfig {
            tf,
            adx_trend_threshold: default_adx_trend_threshold(),
            score_threshold: default_score_threshold(),
        })
        .collect()
}

// =============================================================================
// Sections
// =============================================================================

/// Upstream exchange feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// "spot", "usdt_perp" or "coin_perp"; selects the stream host.
    #[serde(default = "default_market_type")]
    pub market_type: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            market_type: default_market_type(),
        }
    }
}

/// One target timeframe with its decision thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeConfig {
    pub tf: Timeframe,
    #[serde(default = "default_adx_trend_threshold")]
    pub adx_trend_threshold: f64,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u32,
}

impl TimeframeConfig {
    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            adx_trend_threshold: self.adx_trend_threshold,
            score_threshold: self.score_threshold,
        }
    }
}

/// Notifier sink credentials and switches. Opaque to the pipeline core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub telegram_token: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub enable_telegram: bool,
    #[serde(default)]
    pub enable_webhook: bool,
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the Borealis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Target roll-up timeframes, fastest first. Order also defines the
    /// consensus display order.
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<TimeframeConfig>,

    #[serde(default)]
    pub indicators: IndicatorParams,

    #[serde(default)]
    pub sr: SrParams,

    #[serde(default)]
    pub alerts: AlertConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            timeframes: default_timeframes(),
            indicators: IndicatorParams::default(),
            sr: SrParams::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file, interpolating `${NAME}`
    /// environment references in the raw text first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let expanded = expand_env_vars(&content)?;

        let config: Self = serde_json::from_str(&expanded)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.exchange.symbols,
            timeframes = config.timeframes.len(),
            "runtime config loaded"
        );
        Ok(config)
    }

    /// Persist the current configuration using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Target timeframes in configured order.
    pub fn target_timeframes(&self) -> Vec<Timeframe> {
        self.timeframes.iter().map(|t| t.tf).collect()
    }

    /// Decision thresholds for one timeframe, falling back to defaults for
    /// timeframes missing from the config.
    pub fn thresholds_for(&self, tf: Timeframe) -> SignalThresholds {
        self.timeframes
            .iter()
            .find(|t| t.tf == tf)
            .map(TimeframeConfig::thresholds)
            .unwrap_or_default()
    }
}

/// Replace every `${NAME}` with the value of the environment variable `NAME`.
/// Unresolved names are left in place unchanged.
fn expand_env_vars(raw: &str) -> Result<String> {
    let pattern = Regex::new(ENV_VAR_PATTERN).context("env var pattern")?;
    let expanded = pattern.replace_all(raw, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(expanded.into_owned())
}
