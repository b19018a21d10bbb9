// =============================================================================
// Support/Resistance detector — pivot levels merged into adaptive zones
// =============================================================================
//
// Per (symbol, timeframe) the detector keeps parallel high/low/close arrays
// and a set of price zones. Each closed bar:
//
//   1. append prices and refresh the rolling ATR used for merge tolerance
//   2. decay every zone score, prune zones past `max_age_bars`
//   3. confirm pivots at `idx - pivot_window` and merge/create zones
//   4. count a touch for every zone the close lands inside
//
// Pivots are confirmed `pivot_window` bars after they occur; the state at bar
// `i` therefore reflects pivots up to `i - pivot_window`. Determinism depends
// on this lag.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::indicators::atr::true_range;
use crate::types::Timeframe;

fn default_pivot_window() -> usize {
    5
}
fn default_merge_tolerance_pct() -> f64 {
    0.1
}
fn default_merge_tolerance_atr_mult() -> f64 {
    0.5
}
fn default_max_age_bars() -> usize {
    300
}
fn default_decay_per_bar() -> f64 {
    0.01
}

/// Tuning for pivot discovery and zone lifecycle.
///
/// `merge_tolerance_pct` is a percent (0.1 means 0.1%), not a fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrParams {
    #[serde(default = "default_pivot_window")]
    pub pivot_window: usize,
    #[serde(default = "default_merge_tolerance_pct")]
    pub merge_tolerance_pct: f64,
    #[serde(default = "default_merge_tolerance_atr_mult")]
    pub merge_tolerance_atr_mult: f64,
    #[serde(default = "default_max_age_bars")]
    pub max_age_bars: usize,
    #[serde(default = "default_decay_per_bar")]
    pub decay_per_bar: f64,
}

impl Default for SrParams {
    fn default() -> Self {
        Self {
            pivot_window: default_pivot_window(),
            merge_tolerance_pct: default_merge_tolerance_pct(),
            merge_tolerance_atr_mult: default_merge_tolerance_atr_mult(),
            max_age_bars: default_max_age_bars(),
            decay_per_bar: default_decay_per_bar(),
        }
    }
}

/// A price band built from clustered pivots.
#[derive(Debug, Clone, Serialize)]
pub struct Zone {
    pub price_low: f64,
    pub price_high: f64,
    pub score: f64,
    pub touches: u32,
    pub created_idx: usize,
    pub last_touch_idx: usize,
}

/// Nearest zones on either side of a price. Zones straddling the price are
/// on neither side.
#[derive(Debug, Clone, Default)]
pub struct NearestZones {
    pub support: Option<(f64, f64)>,
    pub resistance: Option<(f64, f64)>,
}

#[derive(Default)]
struct Slot {
    highs: Vec<f64>,
    lows: Vec<f64>,
    closes: Vec<f64>,
    zones: Vec<Zone>,
}

pub struct SrDetector {
    params: SrParams,
    slots: HashMap<(String, Timeframe), Slot>,
}

impl SrDetector {
    pub fn new(params: SrParams) -> Self {
        Self {
            params,
            slots: HashMap::new(),
        }
    }

    /// Fold one closed bar into the (symbol, timeframe) slot.
    pub fn update(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        _open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) {
        let params = self.params.clone();
        let slot = self
            .slots
            .entry((symbol.to_uppercase(), tf))
            .or_default();

        slot.highs.push(high);
        slot.lows.push(low);
        slot.closes.push(close);

        let idx = slot.closes.len() - 1;
        let atr = rolling_atr(&slot.highs, &slot.lows, &slot.closes, 14);

        // Decay, then age out.
        for z in &mut slot.zones {
            z.score = (z.score * (1.0 - params.decay_per_bar)).max(0.0);
        }
        slot.zones
            .retain(|z| idx - z.created_idx <= params.max_age_bars);

        // Pivots become confirmable once `pivot_window` bars have passed.
        let w = params.pivot_window;
        if let Some(center) = idx.checked_sub(w) {
            if is_pivot_high(&slot.highs, center, w) {
                merge_or_create(&mut slot.zones, &params, slot.highs[center], atr, center);
            }
            if is_pivot_low(&slot.lows, center, w) {
                merge_or_create(&mut slot.zones, &params, slot.lows[center], atr, center);
            }
        }

        // Touch pass: the close landing inside a zone reinforces it.
        for z in &mut slot.zones {
            if z.price_low <= close && close <= z.price_high {
                z.touches += 1;
                z.score += 0.5;
                z.last_touch_idx = idx;
            }
        }
    }

    /// Nearest support below and resistance above `price`. Distance ties
    /// break toward the more recently created zone.
    pub fn nearest(&self, symbol: &str, tf: Timeframe, price: f64) -> NearestZones {
        let Some(slot) = self.slots.get(&(symbol.to_uppercase(), tf)) else {
            return NearestZones::default();
        };

        let mut support: Option<&Zone> = None;
        let mut resistance: Option<&Zone> = None;

        for z in &slot.zones {
            if z.price_high <= price {
                let closer = support.map_or(true, |best| {
                    let d = price - z.price_high;
                    let best_d = price - best.price_high;
                    d < best_d || (d == best_d && z.created_idx > best.created_idx)
                });
                if closer {
                    support = Some(z);
                }
            } else if z.price_low >= price {
                let closer = resistance.map_or(true, |best| {
                    let d = z.price_low - price;
                    let best_d = best.price_low - price;
                    d < best_d || (d == best_d && z.created_idx > best.created_idx)
                });
                if closer {
                    resistance = Some(z);
                }
            }
        }

        NearestZones {
            support: support.map(|z| (z.price_low, z.price_high)),
            resistance: resistance.map(|z| (z.price_low, z.price_high)),
        }
    }

    /// Current zones for a key (insertion order).
    pub fn zones(&self, symbol: &str, tf: Timeframe) -> &[Zone] {
        self.slots
            .get(&(symbol.to_uppercase(), tf))
            .map_or(&[], |s| s.zones.as_slice())
    }
}

/// Simple mean of the last `min(n - 1, length)` true ranges; 0 below 2 bars.
/// Not the Wilder ATR from the indicator catalog: this one only sets the
/// merge tolerance scale.
fn rolling_atr(highs: &[f64], lows: &[f64], closes: &[f64], length: usize) -> f64 {
    let n = closes.len();
    if n < 2 {
        return 0.0;
    }
    let start = n.saturating_sub(length).max(1);
    let mut sum = 0.0;
    let mut count = 0;
    for i in start..n {
        sum += true_range(highs[i], lows[i], closes[i - 1]);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Strict local maximum over `[center - w, center + w]`.
fn is_pivot_high(highs: &[f64], center: usize, w: usize) -> bool {
    if center < w || center + w >= highs.len() {
        return false;
    }
    let c = highs[center];
    (center - w..=center + w)
        .filter(|&i| i != center)
        .all(|i| highs[i] < c)
}

/// Strict local minimum over `[center - w, center + w]`.
fn is_pivot_low(lows: &[f64], center: usize, w: usize) -> bool {
    if center < w || center + w >= lows.len() {
        return false;
    }
    let c = lows[center];
    (center - w..=center + w)
        .filter(|&i| i != center)
        .all(|i| lows[i] > c)
}

/// Fold a confirmed pivot level into the zone set.
///
/// The candidate band is `level ± max(level * pct/100, atr_mult * atr)`. It
/// merges into the first overlapping zone in insertion order (expanding that
/// zone to the union); with no overlap a fresh zone is appended.
fn merge_or_create(zones: &mut Vec<Zone>, params: &SrParams, level: f64, atr: f64, cur_idx: usize) {
    let tol = (level * params.merge_tolerance_pct / 100.0)
        .max(params.merge_tolerance_atr_mult * atr);
    let new_low = level - tol;
    let new_high = level + tol;

    for z in zones.iter_mut() {
        if !(new_high < z.price_low || new_low > z.price_high) {
            z.price_low = z.price_low.min(new_low);
            z.price_high = z.price_high.max(new_high);
            z.touches += 1;
            z.score += 1.0;
            z.last_touch_idx = cur_idx;
            return;
        }
    }

    zones.push(Zone {
        price_low: new_low,
        price_high: new_high,
        score: 1.0,
        touches: 1,
        created_idx: cur_idx,
        last_touch_idx: cur_idx,
    });
}
