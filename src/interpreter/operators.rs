//! The synchronous state machines behind Window and Map nodes.
//!
//! Operators never touch the pub/sub fabric: each input event goes in and
//! the items to publish come out, in order. Node tasks wrap them in a mutex
//! and do the publishing; tests drive them directly with explicit ticks and
//! watermarks.

use crate::buffer::{BufferEvent, WindowBuffer};
use crate::flush::{BagOf, WindowFlushMode, flush_with_mode};
use crate::handler::Handler;
use crate::node::NodeContext;
use crate::trigger::{TriggerDescription, TriggerManager};
use crate::window::{Item, ItemType, KeyedWindow, TimestampNs};
use crate::windowing::WindowDescription;
use anyhow::{Context as _, Result};
use std::sync::Arc;
use std::time::Duration;

/// Buffers items per keyed window and emits a window's contents when its trigger fires.
#[derive(Debug)]
pub struct WindowOperator {
    buffer: WindowBuffer,
    triggers: TriggerManager,
    force_flush_on_finish: bool,
}

impl WindowOperator {
    pub fn new(window: WindowDescription, trigger: TriggerDescription) -> Self {
        Self {
            buffer: WindowBuffer::new(window),
            triggers: TriggerManager::new(trigger),
            force_flush_on_finish: true,
        }
    }

    pub fn from_context(ctx: &NodeContext) -> Self {
        Self::new(ctx.window().clone(), ctx.trigger().clone())
    }

    #[must_use]
    pub fn with_force_flush_on_finish(mut self, enabled: bool) -> Self {
        self.force_flush_on_finish = enabled;
        self
    }

    pub fn buffer(&self) -> &WindowBuffer {
        &self.buffer
    }

    pub fn triggers(&self) -> &TriggerManager {
        &self.triggers
    }

    pub fn on_item(&mut self, item: Item) -> Vec<Item> {
        let mut fired = Vec::new();
        for event in self.buffer.append(item) {
            match event {
                BufferEvent::Created(kw) => self.triggers.signal_window_created(&kw),
                BufferEvent::Deleted(kw) => self.triggers.signal_window_deleted(&kw),
                BufferEvent::SizeReached(kw, size) => {
                    fired.extend(self.triggers.signal_window_size_reached(&kw, size))
                }
            }
        }
        self.fire(fired)
    }

    /// Signal a watermark. `i64::MAX` marks the end of input and, with
    /// forced flush on, fires whatever is still buffered.
    pub fn on_watermark(&mut self, ts: TimestampNs) -> Vec<Item> {
        let fired = self.triggers.signal_watermark(ts);
        let mut out = self.fire(fired);
        if ts == TimestampNs::MAX && self.force_flush_on_finish {
            out.extend(self.flush_all());
        }

        let buffer = &self.buffer;
        let retired = self
            .triggers
            .retire(|kw| kw.window.end > ts || buffer.get(kw).is_some());
        if retired > 0 {
            tracing::trace!(retired, watermark = ts, "retired closed window triggers");
        }
        out
    }

    pub fn on_tick(&mut self, period: Duration) -> Vec<Item> {
        let fired = self.triggers.signal_duration(period);
        self.fire(fired)
    }

    /// Input finished: force the final watermark.
    pub fn on_finish(&mut self) -> Vec<Item> {
        self.on_watermark(TimestampNs::MAX)
    }

    /// Fire every buffered window, in keyed-window order.
    pub fn flush_all(&mut self) -> Vec<Item> {
        let pending = self.buffer.keyed_windows();
        for kw in &pending {
            self.triggers.signal_window_deleted(kw);
        }
        self.fire(pending)
    }

    fn fire(&mut self, fired: Vec<KeyedWindow>) -> Vec<Item> {
        fired
            .into_iter()
            .filter_map(|kw| self.buffer.take(&kw))
            .map(|group| {
                tracing::trace!(window = %group.keyed_window(), size = group.data.len(), "window fired");
                group.into_item()
            })
            .collect()
    }
}

/// Applies a handler to every item, honouring the node's flush mode.
pub struct MapOperator {
    handler: Arc<dyn Handler>,
    mode: WindowFlushMode,
    bag: BagOf<Item>,
    watermark: Option<TimestampNs>,
}

impl MapOperator {
    pub fn new(handler: Arc<dyn Handler>, mode: WindowFlushMode) -> Self {
        Self {
            handler,
            mode,
            bag: BagOf::new(),
            watermark: None,
        }
    }

    pub fn mode(&self) -> WindowFlushMode {
        self.mode
    }

    pub fn bag(&self) -> &BagOf<Item> {
        &self.bag
    }

    /// Route one item:
    /// - `RetractAndAggregate` items go to [`Handler::retract`];
    /// - unwindowed items go straight to [`Handler::process`];
    /// - windowed items go through the flush-mode combinator.
    pub fn on_item(&mut self, item: Item) -> Result<Vec<Item>> {
        let mut out = Vec::new();
        let key = item.key.clone();

        if item.kind == ItemType::RetractAndAggregate {
            self.handler
                .retract(item, &mut |i| out.push(i))
                .with_context(|| format!("retracting key {key:?}"))?;
            return Ok(out);
        }

        if let Some(kw) = item.keyed_window() {
            if self.is_closed(&kw) {
                tracing::warn!(window = %kw, "dropping late item for a closed window");
                return Ok(out);
            }
        }

        flush_with_mode(self.mode, &mut self.bag, &*self.handler, item, &mut |i| out.push(i))
            .with_context(|| format!("processing key {key:?}"))?;
        Ok(out)
    }

    /// Track the watermark; when late arrival is off, forget windows it closed.
    pub fn on_watermark(&mut self, ts: TimestampNs) {
        let ts = self.watermark.map_or(ts, |cur| cur.max(ts));
        self.watermark = Some(ts);
        if self.mode.keeps_state() && !self.mode.allows_late_arrival() {
            let evicted = self.bag.evict(|i| i.window.is_some_and(|w| w.end <= ts));
            if !evicted.is_empty() {
                tracing::trace!(evicted = evicted.len(), watermark = ts, "closed aggregation windows");
            }
        }
    }

    fn is_closed(&self, kw: &KeyedWindow) -> bool {
        !self.mode.allows_late_arrival() && self.watermark.is_some_and(|wm| kw.window.end <= wm)
    }
}
