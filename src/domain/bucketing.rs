// Interval bucketing - aligns timestamps to fixed-width intervals

/// Start of the interval of width `duration_ms` containing `timestamp_ms`.
///
/// A non-positive width leaves the timestamp unaligned.
pub fn interval_start(timestamp_ms: i64, duration_ms: i64) -> i64 {
    if duration_ms <= 0 {
        return timestamp_ms;
    }
    timestamp_ms.div_euclid(duration_ms) * duration_ms
}

/// Midpoint of the aggregation window containing `timestamp_ms`, so that
/// aggregated chart points sit centered in their window.
pub fn window_center(timestamp_ms: i64, window_ms: i64) -> i64 {
    interval_start(timestamp_ms, window_ms).saturating_add(window_ms.max(0) / 2)
}

pub fn minutes_to_ms(minutes: u32) -> i64 {
    i64::from(minutes) * 60_000
}
