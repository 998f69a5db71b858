//! Trigger policies and their evaluation.
//!
//! A [`TriggerDescription`] is immutable configuration shared by every window
//! of a node. Each live (key, window) pair owns a [`WindowTrigger`] whose
//! [`TriggerState`] tree mirrors the description and is fed
//! [`TriggerSignal`]s by the [`TriggerManager`]. Periodic signals come from
//! [`Tickers`], one thread per distinct [`AtPeriod`](TriggerDescription::AtPeriod)
//! duration.
//!
//! ```
//! use std::time::Duration;
//! use windflow::trigger::TriggerDescription;
//!
//! // Fire once the watermark passed the window end and a period elapsed.
//! let t = TriggerDescription::all_of(vec![
//!     TriggerDescription::at_period(Duration::from_millis(100)),
//!     TriggerDescription::at_watermark(),
//! ]);
//! assert_eq!(t.periods(), vec![Duration::from_millis(100)]);
//! ```

pub mod manager;
pub mod state;
pub mod ticker;

pub use manager::TriggerManager;
pub use state::{TriggerState, Verdict, WindowTrigger};
pub use ticker::{MIN_TICK_INTERVAL, TickFn, Tickers};

use crate::window::TimestampNs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a window's buffered contents should be emitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerDescription {
    /// Fires on every tick of the given period.
    AtPeriod { duration: Duration },
    /// Fires when the window holds exactly `number` items.
    AtWindowItemSize { number: usize },
    /// Fires once the watermark reaches `timestamp`; `None` means the window's end.
    AtWatermark { timestamp: Option<TimestampNs> },
    AnyOf(Vec<TriggerDescription>),
    AllOf(Vec<TriggerDescription>),
}

impl Default for TriggerDescription {
    fn default() -> Self {
        Self::at_watermark()
    }
}

impl TriggerDescription {
    pub fn at_period(duration: Duration) -> Self {
        Self::AtPeriod { duration }
    }

    pub fn at_window_item_size(number: usize) -> Self {
        Self::AtWindowItemSize { number }
    }

    pub fn at_watermark() -> Self {
        Self::AtWatermark { timestamp: None }
    }

    pub fn any_of(triggers: Vec<TriggerDescription>) -> Self {
        Self::AnyOf(triggers)
    }

    pub fn all_of(triggers: Vec<TriggerDescription>) -> Self {
        Self::AllOf(triggers)
    }

    /// Distinct `AtPeriod` durations found anywhere in the tree, sorted.
    pub fn periods(&self) -> Vec<Duration> {
        let mut out = Vec::new();
        self.collect_periods(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_periods(&self, out: &mut Vec<Duration>) {
        match self {
            Self::AtPeriod { duration } => out.push(*duration),
            Self::AtWindowItemSize { .. } | Self::AtWatermark { .. } => {}
            Self::AnyOf(children) | Self::AllOf(children) => {
                for child in children {
                    child.collect_periods(out);
                }
            }
        }
    }
}

/// An external event fed to every live trigger.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerSignal {
    /// A periodic ticker with this period fired.
    Period(Duration),
    /// A window grew to this many items.
    WindowItemSize(usize),
    /// The watermark advanced to this timestamp.
    Watermark(TimestampNs),
}
