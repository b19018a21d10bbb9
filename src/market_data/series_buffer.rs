// =============================================================================
// SeriesBuffer — bounded ring of closed bars per (symbol, timeframe)
// =============================================================================
//
// The pipeline task is the only writer; the indicator engine reads immutable
// snapshots. The ring evicts oldest-first once `limit` is exceeded, so memory
// stays bounded no matter how long the stream runs.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::market_data::Bar;
use crate::types::Timeframe;

/// Default per-key capacity. Must stay comfortably above the largest
/// indicator lookback (EMA 200 with defaults).
pub const DEFAULT_SERIES_LIMIT: usize = 3000;

pub struct SeriesBuffer {
    slots: RwLock<HashMap<(String, Timeframe), VecDeque<Bar>>>,
    limit: usize,
}

impl SeriesBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            limit,
        }
    }

    /// Append one closed bar, evicting the oldest entries beyond `limit`.
    pub fn append(&self, bar: &Bar) {
        let mut map = self.slots.write();
        let ring = map
            .entry((bar.symbol.to_uppercase(), bar.timeframe))
            .or_insert_with(|| VecDeque::with_capacity(64));
        ring.push_back(bar.clone());
        while ring.len() > self.limit {
            ring.pop_front();
        }
    }

    /// Ordered (oldest-first) copy of the series for read-only consumption.
    pub fn snapshot(&self, symbol: &str, tf: Timeframe) -> Vec<Bar> {
        let map = self.slots.read();
        match map.get(&(symbol.to_uppercase(), tf)) {
            Some(ring) => ring.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Number of closed bars currently held for a key.
    pub fn len(&self, symbol: &str, tf: Timeframe) -> usize {
        let map = self.slots.read();
        map.get(&(symbol.to_uppercase(), tf))
            .map_or(0, VecDeque::len)
    }
}

impl Default for SeriesBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_LIMIT)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn bar(t_open: i64, close: f64) -> Bar {
        Bar {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M15,
            t_open,
            t_close: t_open + 900_000,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            closed: true,
        }
    }

    #[test]
    fn append_and_snapshot_preserve_order() {
        let buf = SeriesBuffer::new(10);
        for i in 0..4 {
            buf.append(&bar(i * 900_000, 100.0 + i as f64));
        }
        let series = buf.snapshot("BTCUSDT", Timeframe::M15);
        let closes: Vec<f64> = series.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![100.0, 101.0, 102.0, 103.0]);
        assert_eq!(buf.len("BTCUSDT", Timeframe::M15), 4);
    }

    #[test]
    fn evicts_oldest_beyond_limit() {
        let buf = SeriesBuffer::new(3);
        for i in 0..5 {
            buf.append(&bar(i * 900_000, 100.0 + i as f64));
        }
        let closes: Vec<f64> = buf
            .snapshot("BTCUSDT", Timeframe::M15)
            .iter()
            .map(|b| b.close)
            .collect();
        assert_eq!(closes, vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn keys_are_independent_and_case_folded() {
        let buf = SeriesBuffer::new(10);
        buf.append(&bar(0, 100.0));
        let mut other = bar(0, 50.0);
        other.symbol = "ethusdt".into();
        buf.append(&other);

        assert_eq!(buf.len("BTCUSDT", Timeframe::M15), 1);
        assert_eq!(buf.len("ETHUSDT", Timeframe::M15), 1);
        assert_eq!(buf.len("ETHUSDT", Timeframe::H1), 0);
    }

    #[test]
    fn unknown_key_is_empty() {
        let buf = SeriesBuffer::default();
        assert!(buf.snapshot("XYZUSDT", Timeframe::H4).is_empty());
        assert_eq!(buf.len("XYZUSDT", Timeframe::H4), 0);
    }
}
