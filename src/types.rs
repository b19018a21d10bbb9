// =============================================================================
// Shared types used across the Borealis signal engine
// =============================================================================

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bar period. Ordered by duration so that multi-timeframe maps iterate from
/// the fastest timeframe to the slowest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    M15,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    /// Bar duration in minutes.
    pub fn minutes(self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M15 => 15,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1440,
            Self::W1 => 10080,
        }
    }

    /// Bar duration in epoch milliseconds.
    pub fn duration_ms(self) -> i64 {
        self.minutes() * 60_000
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::M1 => write!(f, "1m"),
            Self::M15 => write!(f, "M15"),
            Self::H1 => write!(f, "H1"),
            Self::H4 => write!(f, "H4"),
            Self::D1 => write!(f, "D1"),
            Self::W1 => write!(f, "W1"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1M" | "1MIN" | "1MINUTE" | "1" => Ok(Self::M1),
            "M15" => Ok(Self::M15),
            "H1" => Ok(Self::H1),
            "H4" => Ok(Self::H4),
            "D1" => Ok(Self::D1),
            "W1" => Ok(Self::W1),
            other => anyhow::bail!("unsupported timeframe tag: {other}"),
        }
    }
}

/// Trade direction attached to a per-timeframe signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Coarse market classification derived from EMA slope and ADX strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    TrendBull,
    TrendBear,
    Range,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrendBull => write!(f, "trend_bull"),
            Self::TrendBear => write!(f, "trend_bear"),
            Self::Range => write!(f, "range"),
        }
    }
}

/// Multi-timeframe agreement for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Consensus {
    StrongLong,
    StrongShort,
    Mixed,
}

impl std::fmt::Display for Consensus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongLong => write!(f, "STRONG_LONG"),
            Self::StrongShort => write!(f, "STRONG_SHORT"),
            Self::Mixed => write!(f, "MIXED"),
        }
    }
}

/// Indicator subset published with every signal. Missing values serialize as
/// `null` so downstream consumers can tell "not warm" from zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub atr: Option<f64>,
    pub bb_width: Option<f64>,
    pub macd_hist: Option<f64>,
}

/// Nearest support/resistance bands, each as a `[low, high]` pair or `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SrSnapshot {
    pub nearest_support: Option<(f64, f64)>,
    pub nearest_resistance: Option<(f64, f64)>,
}

/// Scored directional signal for one (symbol, timeframe) bar close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfSignal {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub closed_at: i64,
    pub regime: Regime,
    pub signal: Direction,
    pub score: u32,
    pub price: f64,
    pub indicators: IndicatorSnapshot,
    pub sr: SrSnapshot,
    pub entry_hint: f64,
    pub sl_hint: f64,
    pub tp_hint: f64,
    pub rationale: Vec<String>,
}

/// Multi-timeframe snapshot for one symbol, emitted once every configured
/// timeframe has produced at least one signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub symbol: String,
    pub closed_at: i64,
    pub consensus: Consensus,
    pub per_tf: BTreeMap<Timeframe, TfSignal>,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parses_common_tags() {
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("M15".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!("h4".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!("W1".parse::<Timeframe>().unwrap(), Timeframe::W1);
        assert!("M5".parse::<Timeframe>().is_err());
    }

    #[test]
    fn timeframe_orders_by_duration() {
        assert!(Timeframe::M1 < Timeframe::M15);
        assert!(Timeframe::M15 < Timeframe::H1);
        assert!(Timeframe::H4 < Timeframe::D1);
        assert!(Timeframe::D1 < Timeframe::W1);
    }

    #[test]
    fn timeframe_serde_roundtrip() {
        let json = serde_json::to_string(&Timeframe::M1).unwrap();
        assert_eq!(json, "\"1m\"");
        let tf: Timeframe = serde_json::from_str("\"M15\"").unwrap();
        assert_eq!(tf, Timeframe::M15);
    }

    #[test]
    fn enums_serialize_to_wire_names() {
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"LONG\"");
        assert_eq!(
            serde_json::to_string(&Regime::TrendBull).unwrap(),
            "\"trend_bull\""
        );
        assert_eq!(
            serde_json::to_string(&Consensus::StrongShort).unwrap(),
            "\"STRONG_SHORT\""
        );
    }

    #[test]
    fn sr_snapshot_pairs_serialize_as_arrays() {
        let sr = SrSnapshot {
            nearest_support: Some((99.0, 100.0)),
            nearest_resistance: None,
        };
        let json = serde_json::to_value(&sr).unwrap();
        assert_eq!(json["nearest_support"][0], 99.0);
        assert_eq!(json["nearest_support"][1], 100.0);
        assert!(json["nearest_resistance"].is_null());
    }
}
