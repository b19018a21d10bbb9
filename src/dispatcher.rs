// =============================================================================
// Dispatcher — wires the feed source through the signal pipeline
// =============================================================================
//
// A single task owns the whole chain: each closed 1-minute bar is processed
// to completion (all timeframes, all resulting signals and snapshots) before
// the next bar is consumed. Notifier deliveries are fire-and-forget and never
// touch pipeline state.
//
// Per-bar failures are logged and isolated; one bad bar cannot poison the
// stream.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::alerts::Notifier;
use crate::indicators::{self, compute_features, IndicatorParams};
use crate::market_data::{Bar, CandleAggregator, SeriesBuffer};
use crate::runtime_config::RuntimeConfig;
use crate::signals::{decide, ConsensusTracker, SignalThresholds};
use crate::sr::SrDetector;
use crate::types::{IndicatorSnapshot, SrSnapshot, TfSignal, Timeframe};

/// A finished message on its way to the notifier sink.
#[derive(Debug, Clone)]
pub enum Outbound {
    Signal(TfSignal),
    Snapshot(crate::types::Snapshot),
}

pub struct Dispatcher {
    symbols: Vec<String>,
    thresholds: HashMap<Timeframe, SignalThresholds>,
    params: IndicatorParams,
    warmup: usize,
    aggregator: CandleAggregator,
    buffer: SeriesBuffer,
    detector: SrDetector,
    consensus: ConsensusTracker,
    notifier: Arc<Notifier>,
}

impl Dispatcher {
    pub fn new(config: &RuntimeConfig, notifier: Arc<Notifier>) -> Self {
        let symbols: Vec<String> = config
            .exchange
            .symbols
            .iter()
            .map(|s| s.to_uppercase())
            .collect();
        let targets = config.target_timeframes();
        let thresholds = targets
            .iter()
            .map(|&tf| (tf, config.thresholds_for(tf)))
            .collect();

        Self {
            symbols,
            thresholds,
            params: config.indicators.clone(),
            warmup: indicators::warmup_bars(&config.indicators),
            aggregator: CandleAggregator::new(targets.clone()),
            buffer: SeriesBuffer::default(),
            detector: SrDetector::new(config.sr.clone()),
            consensus: ConsensusTracker::new(targets),
            notifier,
        }
    }

    /// Consume the feed until the channel closes (or the task is cancelled at
    /// this suspension point).
    pub async fn run(mut self, mut rx: mpsc::Receiver<Bar>) {
        info!(symbols = ?self.symbols, "dispatcher running");
        while let Some(bar) = rx.recv().await {
            match self.process(&bar) {
                Ok(outbound) => self.dispatch(outbound),
                Err(e) => warn!(error = %e, "1m bar rejected"),
            }
        }
        info!("feed channel closed — dispatcher stopping");
    }

    /// Synchronous pipeline step for one feed event. Returns the messages to
    /// hand to the notifier.
    pub fn process(&mut self, bar: &Bar) -> Result<Vec<Outbound>> {
        let mut outbound = Vec::new();

        if !bar.closed {
            return Ok(outbound);
        }
        let symbol = bar.symbol.to_uppercase();
        if !self.symbols.contains(&symbol) {
            debug!(symbol = %symbol, "dropping bar for unconfigured symbol");
            return Ok(outbound);
        }

        let bar1m = Bar {
            symbol,
            ..bar.clone()
        };

        // Disjoint borrows: the aggregator drives the close sink while the
        // sink mutates the rest of the pipeline.
        let Self {
            aggregator,
            buffer,
            detector,
            consensus,
            thresholds,
            params,
            warmup,
            ..
        } = self;

        aggregator.ingest_1m(&bar1m, |closed| {
            on_bar_close(
                closed, buffer, detector, consensus, thresholds, params, *warmup, &mut outbound,
            )
        })?;

        Ok(outbound)
    }

    /// Fire-and-forget notifier submission.
    fn dispatch(&self, outbound: Vec<Outbound>) {
        if !self.notifier.is_active() {
            return;
        }
        for msg in outbound {
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                match msg {
                    Outbound::Signal(s) => notifier.send_signal(&s).await,
                    Outbound::Snapshot(s) => notifier.send_snapshot(&s).await,
                }
            });
        }
    }
}

/// Pipeline tail for one closed higher-timeframe bar: buffer + detector
/// update, warmup gate, features, decision, consensus.
#[allow(clippy::too_many_arguments)]
fn on_bar_close(
    bar: &Bar,
    buffer: &SeriesBuffer,
    detector: &mut SrDetector,
    consensus: &mut ConsensusTracker,
    thresholds: &HashMap<Timeframe, SignalThresholds>,
    params: &IndicatorParams,
    warmup: usize,
    outbound: &mut Vec<Outbound>,
) -> Result<()> {
    buffer.append(bar);
    detector.update(
        &bar.symbol,
        bar.timeframe,
        bar.open,
        bar.high,
        bar.low,
        bar.close,
    );

    let have = buffer.len(&bar.symbol, bar.timeframe);
    if have < warmup {
        info!(
            symbol = %bar.symbol,
            timeframe = %bar.timeframe,
            have,
            need = warmup,
            "warmup — signal suppressed"
        );
        return Ok(());
    }

    let series = buffer.snapshot(&bar.symbol, bar.timeframe);
    let row = compute_features(&series, params).context("empty series after append")?;
    let near = detector.nearest(&bar.symbol, bar.timeframe, row.close);
    let thr = thresholds.get(&bar.timeframe).cloned().unwrap_or_default();
    let decision = decide(&row, &near, &thr);

    let signal = TfSignal {
        symbol: bar.symbol.clone(),
        timeframe: bar.timeframe,
        closed_at: bar.t_close,
        regime: decision.regime,
        signal: decision.direction,
        score: decision.score,
        price: row.close,
        indicators: IndicatorSnapshot {
            ema_fast: row.ema_fast,
            ema_slow: row.ema_slow,
            rsi: row.rsi,
            adx: row.adx,
            atr: row.atr,
            bb_width: row.bb_width,
            macd_hist: row.macd_hist,
        },
        sr: SrSnapshot {
            nearest_support: near.support,
            nearest_resistance: near.resistance,
        },
        entry_hint: decision.entry,
        sl_hint: decision.sl,
        tp_hint: decision.tp,
        rationale: decision.rationale,
    };

    info!(
        symbol = %signal.symbol,
        timeframe = %signal.timeframe,
        signal = %signal.signal,
        score = signal.score,
        regime = %signal.regime,
        price = signal.price,
        "signal"
    );
    outbound.push(Outbound::Signal(signal.clone()));

    if let Some(snapshot) = consensus.observe(signal) {
        info!(
            symbol = %snapshot.symbol,
            consensus = %snapshot.consensus,
            "snapshot"
        );
        outbound.push(Outbound::Snapshot(snapshot));
    }

    Ok(())
}
