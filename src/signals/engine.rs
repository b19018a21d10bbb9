// =============================================================================
// Signal engine — regime classification, scoring profiles, risk hints
// =============================================================================
//
// One evaluation per (symbol, timeframe) bar close. The regime picks the
// scoring profile, the profile accumulates points from independent rules, and
// the direction only survives when the total clears `score_threshold`.
//
// A rule whose feature is missing contributes nothing and adds no rationale
// tag; a missing ATR degrades the risk hints to the close price rather than
// erroring.

use serde::{Deserialize, Serialize};

use crate::indicators::FeatureRow;
use crate::sr::NearestZones;
use crate::types::{Direction, Regime};

fn default_adx_trend_threshold() -> f64 {
    20.0
}
fn default_score_threshold() -> u32 {
    70
}

/// Per-timeframe decision thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalThresholds {
    #[serde(default = "default_adx_trend_threshold")]
    pub adx_trend_threshold: f64,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u32,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            adx_trend_threshold: default_adx_trend_threshold(),
            score_threshold: default_score_threshold(),
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone)]
pub struct Decision {
    pub regime: Regime,
    pub direction: Direction,
    pub score: u32,
    pub entry: f64,
    pub sl: f64,
    pub tp: f64,
    pub rationale: Vec<String>,
}

pub const MAX_RATIONALE_TAGS: usize = 6;

/// EMA-slope + ADX-strength regime. Any missing input reads as `range`.
pub fn classify_regime(row: &FeatureRow, thresholds: &SignalThresholds) -> Regime {
    match (row.ema_fast, row.ema_slow, row.adx) {
        (Some(fast), Some(slow), Some(adx)) if fast > slow && adx >= thresholds.adx_trend_threshold => {
            Regime::TrendBull
        }
        (Some(fast), Some(slow), Some(adx)) if fast < slow && adx >= thresholds.adx_trend_threshold => {
            Regime::TrendBear
        }
        _ => Regime::Range,
    }
}

/// Evaluate the profile selected by the regime and gate the direction on the
/// score threshold.
pub fn decide(row: &FeatureRow, sr: &NearestZones, thresholds: &SignalThresholds) -> Decision {
    let regime = classify_regime(row, thresholds);
    let candidate = match regime {
        Regime::TrendBull => score_trend_long(row, sr),
        Regime::TrendBear => score_trend_short(row, sr),
        Regime::Range => score_range(row, sr),
    };

    let score = candidate.score.min(100);
    let direction = if score >= thresholds.score_threshold {
        candidate.side
    } else {
        Direction::Neutral
    };

    let mut rationale: Vec<String> = candidate.reasons.iter().map(|r| r.to_string()).collect();
    rationale.truncate(MAX_RATIONALE_TAGS);

    Decision {
        regime,
        direction,
        score,
        entry: candidate.entry,
        sl: candidate.sl,
        tp: candidate.tp,
        rationale,
    }
}

struct Candidate {
    side: Direction,
    score: u32,
    reasons: Vec<&'static str>,
    entry: f64,
    sl: f64,
    tp: f64,
}

/// Trend-bull profile: momentum stack plus breakout over resistance.
fn score_trend_long(row: &FeatureRow, sr: &NearestZones) -> Candidate {
    let mut score = 0;
    let mut reasons = Vec::new();
    let close = row.close;
    let atr = row.atr.unwrap_or(0.0);

    if let (Some(fast), Some(slow)) = (row.ema_fast, row.ema_slow) {
        if fast > slow {
            score += 25;
            reasons.push("EMAfast>EMAslow");
        }
    }
    if matches!(row.rsi, Some(rsi) if rsi > 50.0) {
        score += 25;
        reasons.push("RSI>50");
    }
    if matches!(row.macd_hist, Some(hist) if hist > 0.0) {
        score += 20;
        reasons.push("MACD_hist>0");
    }
    match sr.resistance {
        Some((_, r_high)) => {
            if close > r_high + 0.1 * atr {
                score += 30;
                reasons.push("Break>R+buffer");
            }
        }
        None => {
            score += 10;
            reasons.push("No nearby R");
        }
    }

    let entry = close;
    let mut sl = close - 1.5 * atr;
    if let Some((_, s_high)) = sr.support {
        sl = sl.min(s_high - 0.1 * atr);
    }
    let tp = entry + 2.0 * (entry - sl);

    Candidate {
        side: Direction::Long,
        score,
        reasons,
        entry,
        sl,
        tp,
    }
}

/// Trend-bear profile: the exact mirror of the long profile.
fn score_trend_short(row: &FeatureRow, sr: &NearestZones) -> Candidate {
    let mut score = 0;
    let mut reasons = Vec::new();
    let close = row.close;
    let atr = row.atr.unwrap_or(0.0);

    if let (Some(fast), Some(slow)) = (row.ema_fast, row.ema_slow) {
        if fast < slow {
            score += 25;
            reasons.push("EMAfast<EMAslow");
        }
    }
    if matches!(row.rsi, Some(rsi) if rsi < 50.0) {
        score += 25;
        reasons.push("RSI<50");
    }
    if matches!(row.macd_hist, Some(hist) if hist < 0.0) {
        score += 20;
        reasons.push("MACD_hist<0");
    }
    match sr.support {
        Some((s_low, _)) => {
            if close < s_low - 0.1 * atr {
                score += 30;
                reasons.push("Break<S-buffer");
            }
        }
        None => {
            score += 10;
            reasons.push("No nearby S");
        }
    }

    let entry = close;
    let mut sl = close + 1.5 * atr;
    if let Some((r_low, _)) = sr.resistance {
        sl = sl.max(r_low + 0.1 * atr);
    }
    let tp = entry - 2.0 * (sl - entry);

    Candidate {
        side: Direction::Short,
        score,
        reasons,
        entry,
        sl,
        tp,
    }
}

/// Range-reversal profile: fade the nearer zone edge with a tighter stop.
fn score_range(row: &FeatureRow, sr: &NearestZones) -> Candidate {
    let close = row.close;
    let atr = row.atr.unwrap_or(0.0);

    let dist_support = sr
        .support
        .map(|(_, s_high)| (close - s_high).abs())
        .unwrap_or(f64::INFINITY);
    let dist_resistance = sr
        .resistance
        .map(|(r_low, _)| (r_low - close).abs())
        .unwrap_or(f64::INFINITY);

    if dist_support < dist_resistance {
        let mut score = 0;
        let mut reasons = Vec::new();
        if let Some((s_low, s_high)) = sr.support {
            if s_low - 0.1 * atr <= close && close <= s_high + 0.1 * atr {
                score += 40;
                reasons.push("AtSupportZone");
            }
        }
        if matches!(row.rsi, Some(rsi) if rsi < 45.0) {
            score += 15;
            reasons.push("RSI<45");
        }
        if matches!(row.macd_hist, Some(hist) if hist >= 0.0) {
            score += 10;
            reasons.push("MACD_hist>=0");
        }

        let entry = close;
        let mut sl = close - 1.2 * atr;
        if let Some((s_low, _)) = sr.support {
            sl = sl.max(s_low - 0.1 * atr);
        }
        let tp = entry + 2.0 * (entry - sl);

        Candidate {
            side: Direction::Long,
            score,
            reasons,
            entry,
            sl,
            tp,
        }
    } else {
        let mut score = 0;
        let mut reasons = Vec::new();
        if let Some((r_low, r_high)) = sr.resistance {
            if r_low - 0.1 * atr <= close && close <= r_high + 0.1 * atr {
                score += 40;
                reasons.push("AtResistanceZone");
            }
        }
        if matches!(row.rsi, Some(rsi) if rsi > 55.0) {
            score += 15;
            reasons.push("RSI>55");
        }
        if matches!(row.macd_hist, Some(hist) if hist <= 0.0) {
            score += 10;
            reasons.push("MACD_hist<=0");
        }

        let entry = close;
        let mut sl = close + 1.2 * atr;
        if let Some((_, r_high)) = sr.resistance {
            sl = sl.min(r_high + 0.1 * atr);
        }
        let tp = entry - 2.0 * (sl - entry);

        Candidate {
            side: Direction::Short,
            score,
            reasons,
            entry,
            sl,
            tp,
        }
    }
}
