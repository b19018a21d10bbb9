// =============================================================================
// Relative Strength Index (RSI) — Wilder smoothing
// =============================================================================
//
// Seed: average gain / average loss over the first `period` deltas.
// Then:  avg_x = (avg_x_prev * (period - 1) + x) / period
//        RSI   = 100 - 100 / (1 + avg_gain / avg_loss)

/// RSI series for `closes`. One output per close starting at index `period`
/// (the first `period + 1` closes seed the averages), so the series is
/// undefined until strictly more than `period` inputs exist.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let mut avg_gain = deltas[..period].iter().filter(|d| **d > 0.0).sum::<f64>() / period_f;
    let mut avg_loss = deltas[..period]
        .iter()
        .filter(|d| **d < 0.0)
        .map(|d| d.abs())
        .sum::<f64>()
        / period_f;

    let mut out = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_value(avg_gain, avg_loss) {
        Some(v) => out.push(v),
        None => return out,
    }

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
        match rsi_value(avg_gain, avg_loss) {
            Some(v) => out.push(v),
            None => break,
        }
    }
    out
}

/// Most recent RSI value, or `None` while warming up.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).last().copied()
}

/// RSI in [0, 100] from the smoothed averages. A market with no losses pins
/// to 100; no movement at all reads as neutral 50.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };
    rsi.is_finite().then_some(rsi)
}
