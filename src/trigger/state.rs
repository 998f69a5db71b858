use super::{TriggerDescription, TriggerSignal};
use crate::window::{TimestampNs, Window};
use std::time::Duration;

/// Tri-state evaluation result of one trigger tree node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Verdict {
    #[default]
    Unknown,
    False,
    True,
}

impl Verdict {
    #[inline]
    pub fn is_true(self) -> bool {
        self == Verdict::True
    }
}

impl From<bool> for Verdict {
    fn from(b: bool) -> Self {
        if b { Verdict::True } else { Verdict::False }
    }
}

/// Mutable evaluation tree with the same shape as a [`TriggerDescription`].
///
/// Results are monotonic: a node that evaluated to [`Verdict::True`] stays
/// true, and is never re-evaluated, until the tree is rebuilt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerState {
    AtPeriod { duration: Duration, result: Verdict },
    AtWindowItemSize { number: usize, result: Verdict },
    AtWatermark { timestamp: TimestampNs, result: Verdict },
    AnyOf { children: Vec<TriggerState>, result: Verdict },
    AllOf { children: Vec<TriggerState>, result: Verdict },
}

impl TriggerState {
    /// Build a fresh state for `window`; unset watermark targets become `window.end`.
    pub fn init(description: &TriggerDescription, window: Window) -> Self {
        match description {
            TriggerDescription::AtPeriod { duration } => Self::AtPeriod {
                duration: *duration,
                result: Verdict::Unknown,
            },
            TriggerDescription::AtWindowItemSize { number } => Self::AtWindowItemSize {
                number: *number,
                result: Verdict::Unknown,
            },
            TriggerDescription::AtWatermark { timestamp } => Self::AtWatermark {
                timestamp: timestamp.unwrap_or(window.end),
                result: Verdict::Unknown,
            },
            TriggerDescription::AnyOf(children) => Self::AnyOf {
                children: children.iter().map(|c| Self::init(c, window)).collect(),
                result: Verdict::Unknown,
            },
            TriggerDescription::AllOf(children) => Self::AllOf {
                children: children.iter().map(|c| Self::init(c, window)).collect(),
                result: Verdict::Unknown,
            },
        }
    }

    pub fn result(&self) -> Verdict {
        match self {
            Self::AtPeriod { result, .. }
            | Self::AtWindowItemSize { result, .. }
            | Self::AtWatermark { result, .. }
            | Self::AnyOf { result, .. }
            | Self::AllOf { result, .. } => *result,
        }
    }

    /// Feed one signal through the tree and return the (monotonic) result.
    pub fn evaluate(&mut self, signal: &TriggerSignal) -> bool {
        if self.result().is_true() {
            return true;
        }

        match self {
            Self::AtPeriod { duration, result } => {
                let hit = matches!(signal, TriggerSignal::Period(d) if *d == *duration);
                *result = hit.into();
                hit
            }
            Self::AtWindowItemSize { number, result } => {
                let hit = matches!(signal, TriggerSignal::WindowItemSize(n) if *n == *number);
                *result = hit.into();
                hit
            }
            Self::AtWatermark { timestamp, result } => {
                let hit = matches!(signal, TriggerSignal::Watermark(ts) if *timestamp <= *ts);
                *result = hit.into();
                hit
            }
            Self::AnyOf { children, result } => {
                let mut any = false;
                for child in children.iter_mut() {
                    if child.result().is_true() || child.evaluate(signal) {
                        any = true;
                    }
                }
                *result = any.into();
                any
            }
            Self::AllOf { children, result } => {
                // every pending child sees the signal so partial progress is kept
                for child in children.iter_mut().filter(|c| !c.result().is_true()) {
                    child.evaluate(signal);
                }
                let all = !children.is_empty() && children.iter().all(|c| c.result().is_true());
                *result = all.into();
                all
            }
        }
    }
}

/// Trigger evaluator for a single (key, window) pair.
#[derive(Clone, Debug)]
pub struct WindowTrigger {
    description: TriggerDescription,
    window: Window,
    state: TriggerState,
}

impl WindowTrigger {
    pub fn new(description: &TriggerDescription, window: Window) -> Self {
        Self {
            description: description.clone(),
            window,
            state: TriggerState::init(description, window),
        }
    }

    pub fn receive_event(&mut self, signal: &TriggerSignal) {
        self.state.evaluate(signal);
    }

    pub fn should_trigger(&self) -> bool {
        self.state.result().is_true()
    }

    /// Forget all progress, as if the window had just been created.
    pub fn reset(&mut self) {
        self.state = TriggerState::init(&self.description, self.window);
    }

    pub fn state(&self) -> &TriggerState {
        &self.state
    }

    pub fn window(&self) -> Window {
        self.window
    }
}
