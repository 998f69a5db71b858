//! Window assignment and session merging.
//!
//! These are pure functions over item batches, chained by
//! [`WindowBuffer::append`](crate::buffer::WindowBuffer::append):
//!
//! ```text
//! assign_windows -> drop_timestamps -> group_by_key -> merge_windows
//! ```
//!
//! - **Fixed** windows tile the time axis: `start = t - (t mod width)`.
//! - **Sliding** windows start at every multiple of `period` and overlap, so an
//!   item lands in `ceil(width / period)` of them.
//! - **Session** windows start as `[t, t + gap)` per item and are coalesced by
//!   [`merge_windows`] for items of the same key.

use crate::window::{Item, ItemGroupedByKey, TimestampNs, Window, div_floor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Window policy of a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowDescription {
    Fixed { width: Duration },
    Sliding { width: Duration, period: Duration },
    Session { gap: Duration },
}

impl Default for WindowDescription {
    fn default() -> Self {
        Self::Fixed { width: Duration::from_millis(100) }
    }
}

impl WindowDescription {
    #[inline]
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session { .. })
    }
}

/// Duration as signed nanoseconds, saturating at `i64::MAX`.
#[inline]
pub fn nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Windows an event time belongs to under `policy`, ordered by start.
pub fn windows_for(event_time: TimestampNs, policy: &WindowDescription) -> Vec<Window> {
    match *policy {
        WindowDescription::Fixed { width } => {
            vec![Window::fixed(event_time, nanos(width).max(1))]
        }
        WindowDescription::Sliding { width, period } => {
            let width = nanos(width).max(1);
            let period = nanos(period).max(1);
            let mut out = Vec::new();
            let mut start = div_floor(event_time, period).saturating_mul(period);
            let earliest = event_time.saturating_sub(width);
            while start > earliest {
                out.push(Window::new(start, start.saturating_add(width)));
                start = start.saturating_sub(period);
            }
            out.reverse();
            out
        }
        WindowDescription::Session { gap } => {
            vec![Window::new(event_time, event_time.saturating_add(nanos(gap)))]
        }
    }
}

/// Stamp every item with its window(s), fanning out one item per window.
pub fn assign_windows(items: Vec<Item>, policy: &WindowDescription) -> Vec<Item> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let mut windows = windows_for(item.event_time, policy);
        // period > width leaves gaps between sliding windows
        let Some(last) = windows.pop() else { continue };
        for w in windows {
            out.push(item.clone().in_window(w));
        }
        out.push(item.in_window(last));
    }
    out
}

/// Zero event times so they do not leak into grouping.
pub fn drop_timestamps(items: Vec<Item>) -> Vec<Item> {
    items.into_iter().map(|item| item.at(0)).collect()
}

/// Group items by key, keys in order of first appearance.
pub fn group_by_key(items: Vec<Item>) -> Vec<ItemGroupedByKey> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<ItemGroupedByKey> = Vec::new();
    for item in items {
        match index.get(&item.key) {
            Some(&i) => out[i].data.push(item),
            None => {
                index.insert(item.key.clone(), out.len());
                out.push(ItemGroupedByKey { key: item.key.clone(), data: vec![item] });
            }
        }
    }
    out
}

/// Coalesce session windows per key; a no-op for fixed and sliding policies.
///
/// Items without a window are passed through untouched.
pub fn merge_windows(groups: Vec<ItemGroupedByKey>, policy: &WindowDescription) -> Vec<ItemGroupedByKey> {
    let WindowDescription::Session { gap } = *policy else {
        return groups;
    };

    groups
        .into_iter()
        .map(|mut group| {
            let windows: Vec<Window> = group.data.iter().filter_map(|i| i.window).collect();
            let mut merged = session_merge(&windows, gap).into_iter();
            for item in group.data.iter_mut().filter(|i| i.window.is_some()) {
                item.window = merged.next();
            }
            group
        })
        .collect()
}

/// For every input window, the merged session window it belongs to.
///
/// Windows are bucketed by `floor((start - min_start + gap) / gap)`; all
/// windows sharing a bucket collapse into `[min(starts), max(ends))`.
pub fn session_merge(windows: &[Window], gap: Duration) -> Vec<Window> {
    let Some(min_start) = windows.iter().map(|w| w.start).min() else {
        return Vec::new();
    };
    let gap = nanos(gap).max(1);

    let bucket_of = |w: &Window| div_floor(w.start - min_start + gap, gap);

    let mut spans: HashMap<i64, Window> = HashMap::new();
    for w in windows {
        spans
            .entry(bucket_of(w))
            .and_modify(|acc| *acc = acc.span(w))
            .or_insert(*w);
    }

    windows.iter().map(|w| spans[&bucket_of(w)]).collect()
}
