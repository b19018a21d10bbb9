// =============================================================================
// Candle aggregator — rolls 1-minute bars up into higher-timeframe bars
// =============================================================================
//
// For every configured target timeframe the aggregator keeps one active
// (in-progress) bar per symbol. Incoming 1m bars either open a fresh aligned
// window or fold into the active one; when the 1m bar's close reaches the
// window end, the active bar is promoted to last-closed and handed to the
// on-close sink. Sink failures are logged and never abort ingestion.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::timegrid;
use crate::types::Timeframe;

/// One OHLCV bar. Immutable once `closed` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub t_open: i64,
    pub t_close: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub closed: bool,
}

/// Single-writer roll-up state for all configured (symbol, timeframe) pairs.
pub struct CandleAggregator {
    targets: Vec<Timeframe>,
    active: HashMap<(String, Timeframe), Bar>,
    last_closed: HashMap<(String, Timeframe), Bar>,
}

impl CandleAggregator {
    pub fn new(targets: Vec<Timeframe>) -> Self {
        Self {
            targets,
            active: HashMap::new(),
            last_closed: HashMap::new(),
        }
    }

    /// Most recently closed bar for a (symbol, timeframe) pair, if any.
    pub fn last_closed(&self, symbol: &str, tf: Timeframe) -> Option<&Bar> {
        self.last_closed.get(&(symbol.to_uppercase(), tf))
    }

    /// Fold one closed 1-minute bar into every target timeframe.
    ///
    /// `on_close` is invoked once per higher-timeframe bar that closes as a
    /// result; its errors are caught here so one bad sink call cannot poison
    /// the remaining timeframes or later bars.
    ///
    /// Fails only on invalid input (a non-1m bar).
    pub fn ingest_1m(
        &mut self,
        bar: &Bar,
        mut on_close: impl FnMut(&Bar) -> Result<()>,
    ) -> Result<()> {
        if bar.timeframe != Timeframe::M1 {
            anyhow::bail!("ingest_1m expects a 1m bar, got {}", bar.timeframe);
        }

        let symbol = bar.symbol.to_uppercase();
        let targets = self.targets.clone();
        for tf in targets {
            self.roll(&symbol, tf, bar, &mut on_close);
        }
        Ok(())
    }

    fn roll(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        c1m: &Bar,
        on_close: &mut impl FnMut(&Bar) -> Result<()>,
    ) {
        let t_open_tf = timegrid::align_open(c1m.t_open, tf);
        let t_close_tf = timegrid::end_from_open(t_open_tf, tf);
        let key = (symbol.to_string(), tf);

        let stale = self
            .active
            .get(&key)
            .map_or(true, |cur| cur.t_open != t_open_tf);

        if stale {
            self.active.insert(
                key.clone(),
                Bar {
                    symbol: symbol.to_string(),
                    timeframe: tf,
                    t_open: t_open_tf,
                    t_close: t_close_tf,
                    open: c1m.open,
                    high: c1m.high,
                    low: c1m.low,
                    close: c1m.close,
                    volume: c1m.volume,
                    closed: false,
                },
            );
        } else if let Some(cur) = self.active.get_mut(&key) {
            cur.high = cur.high.max(c1m.high);
            cur.low = cur.low.min(c1m.low);
            cur.close = c1m.close;
            cur.volume += c1m.volume;
        }

        if c1m.t_close >= t_close_tf {
            if let Some(mut done) = self.active.remove(&key) {
                done.closed = true;
                if let Err(e) = on_close(&done) {
                    warn!(
                        symbol = %done.symbol,
                        timeframe = %done.timeframe,
                        error = %e,
                        "on-close sink failed"
                    );
                }
                self.last_closed.insert(key, done);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn bar_1m(t_open: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        Bar {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            t_open,
            t_close: t_open + 60_000,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
            closed: true,
        }
    }

    fn flat_1m(t_open: i64) -> Bar {
        bar_1m(t_open, 100.0, 100.0, 100.0, 100.0, 1.0)
    }

    #[test]
    fn rejects_non_1m_input() {
        let mut agg = CandleAggregator::new(vec![Timeframe::M15]);
        let mut bar = flat_1m(0);
        bar.timeframe = Timeframe::H1;
        bar.t_close = 3_600_000;
        assert!(agg.ingest_1m(&bar, |_| Ok(())).is_err());
    }

    #[test]
    fn m15_rollup_closes_once_at_window_end() {
        let mut agg = CandleAggregator::new(vec![Timeframe::M15]);
        let mut closes: Vec<Bar> = Vec::new();

        for i in 0..15 {
            agg.ingest_1m(&flat_1m(i * 60_000), |b| {
                closes.push(b.clone());
                Ok(())
            })
            .unwrap();
            if i < 14 {
                assert!(closes.is_empty(), "closed early at minute {i}");
            }
        }

        assert_eq!(closes.len(), 1);
        let m15 = &closes[0];
        assert_eq!(m15.t_open, 0);
        assert_eq!(m15.t_close, 900_000);
        assert_eq!(m15.t_close - m15.t_open, Timeframe::M15.duration_ms());
        assert_eq!(m15.open, 100.0);
        assert_eq!(m15.close, 100.0);
        assert!((m15.volume - 15.0).abs() < 1e-12);
        assert!(m15.closed);
        assert!(agg.last_closed("BTCUSDT", Timeframe::M15).is_some());
    }

    #[test]
    fn ohlcv_folding() {
        let mut agg = CandleAggregator::new(vec![Timeframe::M15]);
        let mut closes: Vec<Bar> = Vec::new();

        agg.ingest_1m(&bar_1m(0, 10.0, 12.0, 9.0, 11.0, 2.0), |b| {
            closes.push(b.clone());
            Ok(())
        })
        .unwrap();
        agg.ingest_1m(&bar_1m(60_000, 11.0, 15.0, 10.5, 14.0, 3.0), |b| {
            closes.push(b.clone());
            Ok(())
        })
        .unwrap();
        // Jump to the last minute of the window to force the close.
        agg.ingest_1m(&bar_1m(840_000, 14.0, 14.5, 8.0, 9.5, 1.0), |b| {
            closes.push(b.clone());
            Ok(())
        })
        .unwrap();

        assert_eq!(closes.len(), 1);
        let m15 = &closes[0];
        assert_eq!(m15.open, 10.0);
        assert_eq!(m15.high, 15.0);
        assert_eq!(m15.low, 8.0);
        assert_eq!(m15.close, 9.5);
        assert!((m15.volume - 6.0).abs() < 1e-12);
        assert!(m15.low <= m15.open.min(m15.close));
        assert!(m15.high >= m15.open.max(m15.close));
    }

    #[test]
    fn multiple_targets_close_independently() {
        let mut agg = CandleAggregator::new(vec![Timeframe::M15, Timeframe::H1]);
        let mut closes: Vec<(Timeframe, i64)> = Vec::new();

        for i in 0..60 {
            agg.ingest_1m(&flat_1m(i * 60_000), |b| {
                closes.push((b.timeframe, b.t_close));
                Ok(())
            })
            .unwrap();
        }

        let m15: Vec<i64> = closes
            .iter()
            .filter(|(tf, _)| *tf == Timeframe::M15)
            .map(|(_, t)| *t)
            .collect();
        let h1: Vec<i64> = closes
            .iter()
            .filter(|(tf, _)| *tf == Timeframe::H1)
            .map(|(_, t)| *t)
            .collect();
        assert_eq!(m15, vec![900_000, 1_800_000, 2_700_000, 3_600_000]);
        assert_eq!(h1, vec![3_600_000]);
    }

    #[test]
    fn sink_error_does_not_poison_later_closes() {
        let mut agg = CandleAggregator::new(vec![Timeframe::M15]);
        let mut delivered = 0_u32;
        let mut calls = 0_u32;

        for i in 0..30 {
            agg.ingest_1m(&flat_1m(i * 60_000), |_| {
                calls += 1;
                if calls == 1 {
                    anyhow::bail!("sink down");
                }
                delivered += 1;
                Ok(())
            })
            .unwrap();
        }

        // Both windows closed; the first sink failure was swallowed.
        assert_eq!(calls, 2);
        assert_eq!(delivered, 1);
    }

    #[test]
    fn fresh_window_resets_active_bar() {
        let mut agg = CandleAggregator::new(vec![Timeframe::M15]);
        // First window never completes (only minute 0 seen), then a bar from
        // the next window arrives: the active slot must restart, not fold.
        agg.ingest_1m(&bar_1m(0, 10.0, 20.0, 5.0, 15.0, 1.0), |_| Ok(()))
            .unwrap();
        let mut closes: Vec<Bar> = Vec::new();
        agg.ingest_1m(&bar_1m(1_740_000, 50.0, 51.0, 49.0, 50.5, 1.0), |b| {
            closes.push(b.clone());
            Ok(())
        })
        .unwrap();

        assert_eq!(closes.len(), 1);
        let m15 = &closes[0];
        assert_eq!(m15.t_open, 900_000);
        assert_eq!(m15.open, 50.0);
        assert_eq!(m15.high, 51.0);
    }
}
