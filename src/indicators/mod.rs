// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicator catalog. Every
// calculation returns `Option`/`Vec` so callers are forced to handle
// insufficient-data and numerical-edge-case scenarios; `compute_features`
// bundles the latest value of each into one row for the signal engine.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;

use serde::{Deserialize, Serialize};

use crate::market_data::Bar;

fn default_ema_fast() -> usize {
    50
}
fn default_ema_slow() -> usize {
    200
}
fn default_rsi_length() -> usize {
    14
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_bb_length() -> usize {
    20
}
fn default_bb_std() -> f64 {
    2.0
}
fn default_atr_length() -> usize {
    14
}
fn default_adx_length() -> usize {
    14
}

/// Lookback parameters for the indicator catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,
    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,
    #[serde(default = "default_rsi_length")]
    pub rsi_length: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_bb_length")]
    pub bb_length: usize,
    #[serde(default = "default_bb_std")]
    pub bb_std: f64,
    #[serde(default = "default_atr_length")]
    pub atr_length: usize,
    #[serde(default = "default_adx_length")]
    pub adx_length: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            rsi_length: default_rsi_length(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bb_length: default_bb_length(),
            bb_std: default_bb_std(),
            atr_length: default_atr_length(),
            adx_length: default_adx_length(),
        }
    }
}

/// Minimum closed bars before every feature in the catalog is defined and a
/// signal may be emitted.
pub fn warmup_bars(p: &IndicatorParams) -> usize {
    p.ema_slow
        .max(2 * p.adx_length)
        .max(p.bb_length)
        .max(p.macd_slow + p.macd_signal)
}

/// Latest value of every feature over a bar series. A `None` field means the
/// series is not yet long enough (or the value was numerically degenerate).
#[derive(Debug, Clone, Default)]
pub struct FeatureRow {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<f64>,
    pub close: f64,
}

/// Compute the feature row for the latest bar of `bars` (oldest first).
///
/// Returns `None` only for an empty series.
pub fn compute_features(bars: &[Bar], p: &IndicatorParams) -> Option<FeatureRow> {
    let last = bars.last()?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let macd = macd::calculate_macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal);
    let bb = bollinger::calculate_bollinger(&closes, p.bb_length, p.bb_std);

    Some(FeatureRow {
        ema_fast: ema::latest_ema(&closes, p.ema_fast),
        ema_slow: ema::latest_ema(&closes, p.ema_slow),
        rsi: rsi::latest_rsi(&closes, p.rsi_length),
        macd_line: macd.map(|m| m.line),
        macd_signal: macd.map(|m| m.signal),
        macd_hist: macd.map(|m| m.hist),
        bb_upper: bb.map(|b| b.upper),
        bb_lower: bb.map(|b| b.lower),
        bb_width: bb.map(|b| b.width),
        atr: atr::calculate_atr(&highs, &lows, &closes, p.atr_length),
        adx: adx::calculate_adx(&highs, &lows, &closes, p.adx_length),
        close: last.close,
    })
}
