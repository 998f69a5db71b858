//! Item streams for tests.

use crate::value::Value;
use crate::window::{Item, TimestampNs, div_floor};
use crate::windowing::nanos;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `count` items under `key` with payloads `0..count`, the first at `start`
/// and each following one `every` later.
///
/// ```
/// use std::time::Duration;
/// use windflow::testing::generate_items_every;
///
/// let items = generate_items_every("key", 3, 1_000, Duration::from_nanos(10));
/// let times: Vec<i64> = items.iter().map(|i| i.event_time).collect();
/// assert_eq!(times, vec![1_000, 1_010, 1_020]);
/// ```
#[must_use]
pub fn generate_items_every(key: &str, count: usize, start: TimestampNs, every: Duration) -> Vec<Item> {
    let step = nanos(every);
    (0..count)
        .map(|i| Item::new(key, Value::from(i as i64)).at(start + step * i as i64))
        .collect()
}

/// Current wall-clock time rounded down to a multiple of `width`, so a
/// stream starting there fills fixed windows of `width` from their start.
#[must_use]
pub fn aligned_start(width: Duration) -> TimestampNs {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(nanos)
        .unwrap_or_default();
    let width = nanos(width).max(1);
    div_floor(now, width) * width
}

/// Sum of the integer payloads `range`, as a [`Value`].
#[must_use]
pub fn sum_of(range: std::ops::Range<i64>) -> Value {
    Value::from(range.sum::<i64>())
}
