// =============================================================================
// Average True Range (ATR) — Wilder smoothing
// =============================================================================
//
//   TR_t  = max(H - L, |H - prevClose|, |L - prevClose|)
//   ATR_0 = SMA of the first `period` TR values
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period

/// Most recent ATR over parallel high/low/close sequences (oldest first).
///
/// Returns `None` when `period` is zero, the sequences disagree in length,
/// fewer than `period + 1` bars exist (each TR needs a previous close), or
/// any intermediate value is non-finite.
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let n = closes.len();
    if period == 0 || highs.len() != n || lows.len() != n || n < period + 1 {
        return None;
    }

    let tr: Vec<f64> = (1..n)
        .map(|i| true_range(highs[i], lows[i], closes[i - 1]))
        .collect();

    let period_f = period as f64;
    let seed = tr[..period].iter().sum::<f64>() / period_f;
    if !seed.is_finite() {
        return None;
    }

    let mut atr = seed;
    for &t in &tr[period..] {
        atr = (atr * (period_f - 1.0) + t) / period_f;
        if !atr.is_finite() {
            return None;
        }
    }
    Some(atr)
}

pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}
