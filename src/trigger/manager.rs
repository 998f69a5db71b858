use super::{TriggerDescription, TriggerSignal, WindowTrigger};
use crate::window::{KeyedWindow, TimestampNs};
use std::collections::BTreeMap;
use std::time::Duration;

/// Owns one [`WindowTrigger`] per live keyed window.
///
/// Every `signal_*` call returns the keyed windows whose trigger fired, in
/// [`KeyedWindow`] order; fired triggers are reset before returning.
#[derive(Debug)]
pub struct TriggerManager {
    description: TriggerDescription,
    triggers: BTreeMap<KeyedWindow, WindowTrigger>,
    watermark: Option<TimestampNs>,
}

impl TriggerManager {
    pub fn new(description: TriggerDescription) -> Self {
        Self {
            description,
            triggers: BTreeMap::new(),
            watermark: None,
        }
    }

    pub fn description(&self) -> &TriggerDescription {
        &self.description
    }

    /// Highest watermark observed so far.
    pub fn watermark(&self) -> Option<TimestampNs> {
        self.watermark
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn is_live(&self, kw: &KeyedWindow) -> bool {
        self.triggers.contains_key(kw)
    }

    pub fn signal_window_created(&mut self, kw: &KeyedWindow) {
        let description = &self.description;
        self.triggers
            .entry(kw.clone())
            .or_insert_with(|| WindowTrigger::new(description, kw.window));
    }

    pub fn signal_window_deleted(&mut self, kw: &KeyedWindow) {
        self.triggers.remove(kw);
    }

    /// Drop the triggers for which `keep` is false, returning how many went.
    pub fn retire(&mut self, keep: impl Fn(&KeyedWindow) -> bool) -> usize {
        let before = self.triggers.len();
        self.triggers.retain(|kw, _| keep(kw));
        before - self.triggers.len()
    }

    /// Buffer growth only concerns the window that grew.
    pub fn signal_window_size_reached(&mut self, kw: &KeyedWindow, size: usize) -> Vec<KeyedWindow> {
        let Some(trigger) = self.triggers.get_mut(kw) else {
            return Vec::new();
        };
        trigger.receive_event(&TriggerSignal::WindowItemSize(size));
        if trigger.should_trigger() {
            trigger.reset();
            vec![kw.clone()]
        } else {
            Vec::new()
        }
    }

    pub fn signal_duration(&mut self, period: Duration) -> Vec<KeyedWindow> {
        self.broadcast(TriggerSignal::Period(period))
    }

    /// Watermarks never move backwards; a stale watermark re-signals the current one.
    pub fn signal_watermark(&mut self, ts: TimestampNs) -> Vec<KeyedWindow> {
        let ts = self.watermark.map_or(ts, |cur| cur.max(ts));
        self.watermark = Some(ts);
        self.broadcast(TriggerSignal::Watermark(ts))
    }

    fn broadcast(&mut self, signal: TriggerSignal) -> Vec<KeyedWindow> {
        let mut fired = Vec::new();
        for (kw, trigger) in &mut self.triggers {
            trigger.receive_event(&signal);
            if trigger.should_trigger() {
                fired.push(kw.clone());
                trigger.reset();
            }
        }
        fired
    }
}
