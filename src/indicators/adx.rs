// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
//   1. +DM / -DM and True Range per bar-to-bar transition.
//   2. Wilder running sums of +DM, -DM, TR over `period`.
//   3. +DI = smoothed(+DM) / smoothed(TR) * 100, -DI likewise.
//   4. DX  = |+DI - -DI| / (+DI + -DI) * 100
//   5. ADX = Wilder smoothing of DX over `period`.

use crate::indicators::atr::true_range;

/// Most recent ADX over parallel high/low/close sequences (oldest first).
///
/// Returns `None` when `period` is zero, the sequences disagree in length,
/// fewer than `2 * period + 1` bars exist (`period` transitions to seed the
/// directional sums plus `period` DX values to seed the ADX average), or the
/// total true range of a seed window is zero (no price movement at all).
pub fn calculate_adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let n = closes.len();
    if period == 0 || highs.len() != n || lows.len() != n || n < 2 * period + 1 {
        return None;
    }

    let transitions = n - 1;
    let mut plus_dm = Vec::with_capacity(transitions);
    let mut minus_dm = Vec::with_capacity(transitions);
    let mut tr = Vec::with_capacity(transitions);

    for i in 1..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
        tr.push(true_range(highs[i], lows[i], closes[i - 1]));
    }

    let period_f = period as f64;
    let mut smooth_plus: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = tr[..period].iter().sum();

    let mut dx_values = Vec::with_capacity(transitions - period + 1);
    dx_values.push(directional_index(smooth_plus, smooth_minus, smooth_tr)?);

    for i in period..transitions {
        smooth_plus = smooth_plus - smooth_plus / period_f + plus_dm[i];
        smooth_minus = smooth_minus - smooth_minus / period_f + minus_dm[i];
        smooth_tr = smooth_tr - smooth_tr / period_f + tr[i];
        dx_values.push(directional_index(smooth_plus, smooth_minus, smooth_tr)?);
    }

    if dx_values.len() < period {
        return None;
    }

    let mut adx = dx_values[..period].iter().sum::<f64>() / period_f;
    for &dx in &dx_values[period..] {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
    }

    adx.is_finite().then_some(adx)
}

/// DX from the smoothed directional sums. `None` when the window saw no
/// range at all; 0.0 when movement exists but is directionless.
fn directional_index(smooth_plus: f64, smooth_minus: f64, smooth_tr: f64) -> Option<f64> {
    if smooth_tr == 0.0 {
        return None;
    }
    let plus_di = smooth_plus / smooth_tr * 100.0;
    let minus_di = smooth_minus / smooth_tr * 100.0;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return Some(0.0);
    }
    let dx = (plus_di - minus_di).abs() / di_sum * 100.0;
    dx.is_finite().then_some(dx)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn trending(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let highs: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 2.0 + 1.5).collect();
        let lows: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 2.0 - 0.5).collect();
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 2.0 + 1.0).collect();
        (highs, lows, closes)
    }

    #[test]
    fn needs_two_periods_plus_one() {
        let (h, l, c) = trending(28);
        assert!(calculate_adx(&h, &l, &c, 14).is_none());
        let (h, l, c) = trending(29);
        assert!(calculate_adx(&h, &l, &c, 14).is_some());
    }

    #[test]
    fn zero_period_rejected() {
        let (h, l, c) = trending(40);
        assert!(calculate_adx(&h, &l, &c, 0).is_none());
    }

    #[test]
    fn strong_trend_reads_high() {
        let (h, l, c) = trending(60);
        let adx = calculate_adx(&h, &l, &c, 14).unwrap();
        assert!(adx > 25.0, "expected trending ADX, got {adx}");
    }

    #[test]
    fn directionless_chop_reads_low() {
        // Identical bars: TR > 0 but +DM = -DM = 0, so DX = 0 everywhere.
        let highs = vec![101.0; 60];
        let lows = vec![99.0; 60];
        let closes = vec![100.0; 60];
        let adx = calculate_adx(&highs, &lows, &closes, 14).unwrap();
        assert!(adx < 1.0, "expected ADX near 0, got {adx}");
    }

    #[test]
    fn dead_flat_market_is_undefined() {
        // No range at all: smoothed TR is zero and DX cannot be formed.
        let flat = vec![100.0; 60];
        assert!(calculate_adx(&flat, &flat, &flat, 14).is_none());
    }

    #[test]
    fn stays_in_range() {
        let n = 100;
        let highs: Vec<f64> = (0..n).map(|i| 50.0 + (i as f64 * 0.3).sin() * 10.0 + 1.0).collect();
        let lows: Vec<f64> = (0..n).map(|i| 50.0 + (i as f64 * 0.3).sin() * 10.0 - 1.0).collect();
        let closes: Vec<f64> = (0..n).map(|i| 50.0 + (i as f64 * 0.3).sin() * 10.0 + 0.5).collect();
        if let Some(adx) = calculate_adx(&highs, &lows, &closes, 14) {
            assert!((0.0..=100.0).contains(&adx));
        }
    }
}
