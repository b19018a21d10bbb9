// =============================================================================
// Time grid — epoch-millisecond alignment for timeframe windows
// =============================================================================
//
// All windows are aligned to the UTC epoch grid: an M15 bar opens at a
// multiple of 15 minutes, an H4 bar at a multiple of 4 hours, and so on.
// Weekly bars are the exception: they anchor to Monday 00:00:00 UTC, not to
// the raw epoch (which started on a Thursday).

use crate::types::Timeframe;

const DAY_MS: i64 = 86_400_000;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Epoch day 0 (1970-01-01) was a Thursday, three days past a Monday.
const EPOCH_DAYS_FROM_MONDAY: i64 = 3;

/// Align `ts_ms` down to the open of the enclosing `tf` window.
pub fn align_open(ts_ms: i64, tf: Timeframe) -> i64 {
    if tf == Timeframe::W1 {
        let monday = monday_open_ms(ts_ms);
        monday + (ts_ms - monday).div_euclid(WEEK_MS) * WEEK_MS
    } else {
        let period = tf.duration_ms();
        ts_ms.div_euclid(period) * period
    }
}

/// Close timestamp (exclusive) of a window opening at `t_open_ms`.
pub fn end_from_open(t_open_ms: i64, tf: Timeframe) -> i64 {
    t_open_ms + tf.duration_ms()
}

/// Monday 00:00:00 UTC of the week containing `ts_ms`.
fn monday_open_ms(ts_ms: i64) -> i64 {
    let day = ts_ms.div_euclid(DAY_MS);
    let days_from_monday = (day + EPOCH_DAYS_FROM_MONDAY).rem_euclid(7);
    (day - days_from_monday) * DAY_MS
}
