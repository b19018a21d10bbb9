// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   line   = EMA(fast) - EMA(slow)
//   signal = EMA(signal_period) over the line series
//   hist   = line - signal

use crate::indicators::ema::ema_series;

/// Latest MACD values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub hist: f64,
}

/// Compute the most recent MACD line/signal/histogram.
///
/// Returns `None` until enough closes exist to seed the slow EMA plus the
/// signal EMA over the line series (`slow + signal_period - 1` closes).
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<Macd> {
    if fast == 0 || slow == 0 || signal_period == 0 || fast >= slow {
        return None;
    }

    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);
    if slow_ema.is_empty() {
        return None;
    }

    // Both series end at the last close; align by trailing overlap.
    let n = fast_ema.len().min(slow_ema.len());
    let line: Vec<f64> = fast_ema[fast_ema.len() - n..]
        .iter()
        .zip(&slow_ema[slow_ema.len() - n..])
        .map(|(f, s)| f - s)
        .collect();

    let signal_ema = ema_series(&line, signal_period);
    let signal = *signal_ema.last()?;
    let last_line = *line.last()?;
    let hist = last_line - signal;

    (last_line.is_finite() && signal.is_finite()).then_some(Macd {
        line: last_line,
        signal,
        hist,
    })
}
