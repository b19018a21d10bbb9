// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = rolling SMA, outer bands = SMA +/- k * population sigma.
// Width is the band spread normalised by the middle band:
//   width = (upper - lower) / middle

/// Result of a Bollinger Band calculation over the trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// Bands over the last `period` closes.
///
/// Returns `None` when fewer than `period` closes exist, the middle band is
/// zero, or the result is non-finite.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<Bollinger> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let sigma = variance.sqrt();

    let upper = middle + num_std * sigma;
    let lower = middle - num_std * sigma;
    let width = (upper - lower) / middle;

    width.is_finite().then_some(Bollinger {
        upper,
        middle,
        lower,
        width,
    })
}
