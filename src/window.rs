//! Windows, keyed windows and the items that flow between DAG nodes.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanoseconds since UNIX epoch (UTC).
pub type TimestampNs = i64;

/// A closed-open time range: [start, end).
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Window {
    pub start: TimestampNs,
    pub end: TimestampNs,
}

impl Window {
    #[inline]
    pub fn new(start: TimestampNs, end: TimestampNs) -> Self {
        debug_assert!(end >= start);
        Self { start, end }
    }

    /// Compute the fixed window [win_start, win_start + width) holding a timestamp.
    /// `width` > 0.
    #[inline]
    pub fn fixed(ts: TimestampNs, width: i64) -> Self {
        debug_assert!(width > 0);
        let start = div_floor(ts, width).saturating_mul(width);
        Self { start, end: start.saturating_add(width) }
    }

    #[inline]
    pub fn contains(&self, ts: TimestampNs) -> bool {
        self.start <= ts && ts < self.end
    }

    #[inline]
    pub fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest window covering both `self` and `other`.
    #[inline]
    pub fn span(&self, other: &Window) -> Window {
        Window {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Floor division for i64 (unlike `/` which truncates toward zero).
#[inline]
pub(crate) fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r > 0) != (b > 0)) { q - 1 } else { q }
}

/// Identity of one unit of buffered, triggered and bagged state.
///
/// Ordered by key, then window, so that windows firing together are emitted
/// deterministically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyedWindow {
    pub key: String,
    pub window: Window,
}

impl KeyedWindow {
    pub fn new(key: impl Into<String>, window: Window) -> Self {
        Self { key: key.into(), window }
    }

    /// Canonical string form: `"{key}:{start}.{end}"`.
    pub fn to_key(&self) -> String {
        format!("{}:{}.{}", self.key, self.window.start, self.window.end)
    }
}

impl fmt::Display for KeyedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

/// How a downstream consumer should interpret an item's payload.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    /// A plain value or a (possibly partial) aggregate.
    #[default]
    Aggregation,
    /// A `{Retract, Aggregate}` pair: undo the stale aggregate, then apply the new one.
    RetractAndAggregate,
}

/// The unit of data produced by handlers and exchanged between nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    pub data: Value,
    /// Event time in nanoseconds; `0` means "not set".
    pub event_time: TimestampNs,
    pub window: Option<Window>,
    pub kind: ItemType,
}

impl Item {
    pub fn new(key: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn at(mut self, event_time: TimestampNs) -> Self {
        self.event_time = event_time;
        self
    }

    #[must_use]
    pub fn in_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn of_kind(mut self, kind: ItemType) -> Self {
        self.kind = kind;
        self
    }

    /// The keyed window of a windowed item.
    pub fn keyed_window(&self) -> Option<KeyedWindow> {
        self.window.map(|w| KeyedWindow::new(self.key.clone(), w))
    }
}

/// Items sharing one partition key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemGroupedByKey {
    pub key: String,
    pub data: Vec<Item>,
}

/// Everything buffered for one (key, window) pair, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemGroupedByWindow {
    pub key: String,
    pub window: Window,
    pub data: Vec<Value>,
}

impl ItemGroupedByWindow {
    pub fn new(key: impl Into<String>, window: Window) -> Self {
        Self { key: key.into(), window, data: Vec::new() }
    }

    pub fn keyed_window(&self) -> KeyedWindow {
        KeyedWindow::new(self.key.clone(), self.window)
    }

    /// Collapse the group into a single item stamped at the window's end.
    pub fn into_item(self) -> Item {
        Item {
            key: self.key,
            data: Value::List(self.data),
            event_time: self.window.end,
            window: Some(self.window),
            kind: ItemType::Aggregation,
        }
    }
}
