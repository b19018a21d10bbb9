// =============================================================================
// Consensus tracker — per-symbol multi-timeframe agreement
// =============================================================================
//
// Keeps the latest signal per (symbol, timeframe). Every observed signal
// re-evaluates the symbol: once all configured timeframes have reported at
// least once, a snapshot is emitted with the current consensus. At least two
// timeframes agreeing on a non-neutral side makes the consensus strong.

use std::collections::{BTreeMap, HashMap};

use crate::types::{Consensus, Direction, Snapshot, TfSignal, Timeframe};

pub struct ConsensusTracker {
    timeframes: Vec<Timeframe>,
    latest: HashMap<String, BTreeMap<Timeframe, TfSignal>>,
}

impl ConsensusTracker {
    pub fn new(timeframes: Vec<Timeframe>) -> Self {
        Self {
            timeframes,
            latest: HashMap::new(),
        }
    }

    /// Record one signal; returns a snapshot once the symbol is fully
    /// populated across the configured timeframes.
    pub fn observe(&mut self, signal: TfSignal) -> Option<Snapshot> {
        let symbol = signal.symbol.clone();
        let closed_at = signal.closed_at;

        let per_tf = self.latest.entry(symbol.clone()).or_default();
        per_tf.insert(signal.timeframe, signal);

        if !self.timeframes.iter().all(|tf| per_tf.contains_key(tf)) {
            return None;
        }

        let longs = self
            .timeframes
            .iter()
            .filter(|tf| per_tf.get(tf).map(|s| s.signal) == Some(Direction::Long))
            .count();
        let shorts = self
            .timeframes
            .iter()
            .filter(|tf| per_tf.get(tf).map(|s| s.signal) == Some(Direction::Short))
            .count();

        let consensus = if longs >= 2 {
            Consensus::StrongLong
        } else if shorts >= 2 {
            Consensus::StrongShort
        } else {
            Consensus::Mixed
        };

        let snapshot_tfs: BTreeMap<Timeframe, TfSignal> = self
            .timeframes
            .iter()
            .filter_map(|tf| per_tf.get(tf).map(|s| (*tf, s.clone())))
            .collect();

        Some(Snapshot {
            kind: "snapshot".to_string(),
            symbol,
            closed_at,
            consensus,
            per_tf: snapshot_tfs,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndicatorSnapshot, Regime, SrSnapshot};

    fn signal(symbol: &str, tf: Timeframe, direction: Direction, closed_at: i64) -> TfSignal {
        TfSignal {
            symbol: symbol.into(),
            timeframe: tf,
            closed_at,
            regime: Regime::Range,
            signal: direction,
            score: 80,
            price: 100.0,
            indicators: IndicatorSnapshot::default(),
            sr: SrSnapshot::default(),
            entry_hint: 100.0,
            sl_hint: 99.0,
            tp_hint: 102.0,
            rationale: vec![],
        }
    }

    fn tfs() -> Vec<Timeframe> {
        vec![Timeframe::M15, Timeframe::H1, Timeframe::H4]
    }

    #[test]
    fn no_snapshot_until_all_timeframes_report() {
        let mut tracker = ConsensusTracker::new(tfs());
        assert!(tracker
            .observe(signal("BTCUSDT", Timeframe::M15, Direction::Long, 1))
            .is_none());
        assert!(tracker
            .observe(signal("BTCUSDT", Timeframe::H1, Direction::Long, 2))
            .is_none());
        let snap = tracker
            .observe(signal("BTCUSDT", Timeframe::H4, Direction::Neutral, 3))
            .expect("third timeframe completes the set");
        assert_eq!(snap.consensus, Consensus::StrongLong);
        assert_eq!(snap.per_tf.len(), 3);
        assert_eq!(snap.closed_at, 3);
        assert_eq!(snap.kind, "snapshot");
    }

    #[test]
    fn order_of_arrival_does_not_matter() {
        let mut tracker = ConsensusTracker::new(tfs());
        tracker.observe(signal("BTCUSDT", Timeframe::H4, Direction::Neutral, 1));
        tracker.observe(signal("BTCUSDT", Timeframe::M15, Direction::Long, 2));
        let snap = tracker
            .observe(signal("BTCUSDT", Timeframe::H1, Direction::Long, 3))
            .unwrap();
        assert_eq!(snap.consensus, Consensus::StrongLong);
    }

    #[test]
    fn two_shorts_make_strong_short() {
        let mut tracker = ConsensusTracker::new(tfs());
        tracker.observe(signal("ETHUSDT", Timeframe::M15, Direction::Short, 1));
        tracker.observe(signal("ETHUSDT", Timeframe::H1, Direction::Neutral, 2));
        let snap = tracker
            .observe(signal("ETHUSDT", Timeframe::H4, Direction::Short, 3))
            .unwrap();
        assert_eq!(snap.consensus, Consensus::StrongShort);
    }

    #[test]
    fn disagreement_reads_mixed() {
        let mut tracker = ConsensusTracker::new(tfs());
        tracker.observe(signal("BTCUSDT", Timeframe::M15, Direction::Long, 1));
        tracker.observe(signal("BTCUSDT", Timeframe::H1, Direction::Short, 2));
        let snap = tracker
            .observe(signal("BTCUSDT", Timeframe::H4, Direction::Neutral, 3))
            .unwrap();
        assert_eq!(snap.consensus, Consensus::Mixed);
    }

    #[test]
    fn later_signals_replace_earlier_ones() {
        let mut tracker = ConsensusTracker::new(tfs());
        tracker.observe(signal("BTCUSDT", Timeframe::M15, Direction::Long, 1));
        tracker.observe(signal("BTCUSDT", Timeframe::H1, Direction::Long, 2));
        tracker.observe(signal("BTCUSDT", Timeframe::H4, Direction::Neutral, 3));

        // M15 flips to SHORT; only one long remains.
        let snap = tracker
            .observe(signal("BTCUSDT", Timeframe::M15, Direction::Short, 4))
            .unwrap();
        assert_eq!(snap.consensus, Consensus::Mixed);
        assert_eq!(snap.per_tf[&Timeframe::M15].signal, Direction::Short);
        assert_eq!(snap.closed_at, 4);
    }

    #[test]
    fn symbols_are_tracked_independently() {
        let mut tracker = ConsensusTracker::new(tfs());
        tracker.observe(signal("BTCUSDT", Timeframe::M15, Direction::Long, 1));
        tracker.observe(signal("BTCUSDT", Timeframe::H1, Direction::Long, 2));
        // ETH has only one timeframe so far, so no snapshot for it.
        assert!(tracker
            .observe(signal("ETHUSDT", Timeframe::M15, Direction::Long, 3))
            .is_none());
        // BTC completes independently.
        assert!(tracker
            .observe(signal("BTCUSDT", Timeframe::H4, Direction::Long, 4))
            .is_some());
    }

    #[test]
    fn snapshot_serializes_with_wire_shape() {
        let mut tracker = ConsensusTracker::new(vec![Timeframe::M15, Timeframe::H1]);
        tracker.observe(signal("BTCUSDT", Timeframe::M15, Direction::Long, 1));
        let snap = tracker
            .observe(signal("BTCUSDT", Timeframe::H1, Direction::Long, 2))
            .unwrap();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["consensus"], "STRONG_LONG");
        assert_eq!(json["per_tf"]["M15"]["signal"], "LONG");
        assert_eq!(json["per_tf"]["H1"]["score"], 80);
    }
}
