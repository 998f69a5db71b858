//! In-flight (key, window) groups of a Window node.
//!
//! [`WindowBuffer::append`] runs one item through window assignment and
//! grouping and reports what changed as [`BufferEvent`]s, which the caller
//! forwards to its [`TriggerManager`](crate::trigger::TriggerManager).
//! Fired groups are removed with [`WindowBuffer::take`].

use crate::window::{Item, ItemGroupedByKey, ItemGroupedByWindow, KeyedWindow, Window};
use crate::windowing::{
    WindowDescription, assign_windows, drop_timestamps, group_by_key, merge_windows, session_merge,
};
use std::collections::{BTreeMap, BTreeSet};

/// A change in buffered state that the trigger layer must hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferEvent {
    Created(KeyedWindow),
    SizeReached(KeyedWindow, usize),
    /// The group was absorbed into a merged session window.
    Deleted(KeyedWindow),
}

#[derive(Debug)]
pub struct WindowBuffer {
    policy: WindowDescription,
    groups: BTreeMap<KeyedWindow, ItemGroupedByWindow>,
}

impl WindowBuffer {
    pub fn new(policy: WindowDescription) -> Self {
        Self { policy, groups: BTreeMap::new() }
    }

    pub fn policy(&self) -> &WindowDescription {
        &self.policy
    }

    pub fn append(&mut self, item: Item) -> Vec<BufferEvent> {
        let items = assign_windows(vec![item], &self.policy);
        let items = drop_timestamps(items);
        let groups = group_by_key(items);
        let mut groups = merge_windows(groups, &self.policy);

        let mut events = Vec::new();
        if let WindowDescription::Session { gap } = self.policy {
            for group in &mut groups {
                self.merge_buffered_sessions(group, gap, &mut events);
            }
        }
        self.group_also_by_window(groups, &mut events);
        events
    }

    /// Bucket items by `(key, window)`, creating groups on first touch.
    fn group_also_by_window(&mut self, groups: Vec<ItemGroupedByKey>, events: &mut Vec<BufferEvent>) {
        for group in groups {
            for item in group.data {
                let Some(window) = item.window else { continue };
                let kw = KeyedWindow::new(group.key.clone(), window);
                let bucket = self.groups.entry(kw.clone()).or_insert_with(|| {
                    events.push(BufferEvent::Created(kw.clone()));
                    ItemGroupedByWindow::new(group.key.clone(), window)
                });
                bucket.data.push(item.data);
                events.push(BufferEvent::SizeReached(kw, bucket.data.len()));
            }
        }
    }

    /// Re-run the session bucketing over the key's buffered windows plus the
    /// incoming ones, moving buffered data into the merged windows and
    /// retargeting the incoming items.
    fn merge_buffered_sessions(
        &mut self,
        group: &mut ItemGroupedByKey,
        gap: std::time::Duration,
        events: &mut Vec<BufferEvent>,
    ) {
        let buffered: Vec<Window> = self
            .groups
            .keys()
            .filter(|kw| kw.key == group.key)
            .map(|kw| kw.window)
            .collect();
        if buffered.is_empty() {
            return;
        }

        let incoming = group.data.iter().filter_map(|i| i.window);
        let all: Vec<Window> = buffered.iter().copied().chain(incoming).collect();
        let targets = session_merge(&all, gap);

        let mut incoming_targets = targets[buffered.len()..].iter();
        for item in group.data.iter_mut().filter(|i| i.window.is_some()) {
            item.window = incoming_targets.next().copied();
        }

        let mut moves: BTreeMap<Window, Vec<Window>> = BTreeMap::new();
        for (from, to) in buffered.iter().zip(&targets) {
            moves.entry(*to).or_default().push(*from);
        }

        for (target, sources) in moves {
            if sources == [target] {
                continue;
            }
            let target_kw = KeyedWindow::new(group.key.clone(), target);
            let mut merged = ItemGroupedByWindow::new(group.key.clone(), target);
            let source_set: BTreeSet<Window> = sources.iter().copied().collect();
            for source in &sources {
                let kw = KeyedWindow::new(group.key.clone(), *source);
                if let Some(old) = self.groups.remove(&kw) {
                    merged.data.extend(old.data);
                }
                if *source != target {
                    events.push(BufferEvent::Deleted(kw));
                }
            }
            if !source_set.contains(&target) {
                events.push(BufferEvent::Created(target_kw.clone()));
            }
            let size = merged.data.len();
            self.groups.insert(target_kw.clone(), merged);
            events.push(BufferEvent::SizeReached(target_kw, size));
        }
    }

    /// Remove a fired group.
    pub fn take(&mut self, kw: &KeyedWindow) -> Option<ItemGroupedByWindow> {
        self.groups.remove(kw)
    }

    pub fn get(&self, kw: &KeyedWindow) -> Option<&ItemGroupedByWindow> {
        self.groups.get(kw)
    }

    /// Buffered keyed windows, in order.
    pub fn keyed_windows(&self) -> Vec<KeyedWindow> {
        self.groups.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
