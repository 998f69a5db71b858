//! Flush modes: what a fired window is combined with before re-emission.
//!
//! | Mode | State kept | On a repeat fire of the same keyed window |
//! |---|---|---|
//! | [`Discard`](WindowFlushMode::Discard) | none | handler sees only the new contents |
//! | [`Accumulate`](WindowFlushMode::Accumulate) | last aggregate | handler sees `{Previous, Current}`, result replaces it |
//! | [`AccumulatingAndRetracting`](WindowFlushMode::AccumulatingAndRetracting) | last aggregate | as above, emitted as `{Retract, Aggregate}` |
//!
//! Late data therefore starts a new aggregation cycle instead of mutating
//! anything already published.

use crate::handler::Handler;
use crate::value::{AGGREGATE, CURRENT, PREVIOUS, RETRACT, Value};
use crate::window::{Item, ItemType, KeyedWindow};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowFlushMode {
    #[default]
    Discard,
    Accumulate { allow_late_arrival: bool },
    AccumulatingAndRetracting { allow_late_arrival: bool },
}

impl WindowFlushMode {
    /// Whether data for a window the watermark already closed is still accepted.
    pub fn allows_late_arrival(&self) -> bool {
        match self {
            Self::Discard => true,
            Self::Accumulate { allow_late_arrival }
            | Self::AccumulatingAndRetracting { allow_late_arrival } => *allow_late_arrival,
        }
    }

    pub fn keeps_state(&self) -> bool {
        !matches!(self, Self::Discard)
    }
}

/// Per-node storage of values indexed by keyed window.
#[derive(Clone, Debug)]
pub struct BagOf<T> {
    entries: HashMap<String, T>,
}

impl<T> Default for BagOf<T> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<T> BagOf<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kw: &KeyedWindow) -> Option<&T> {
        self.entries.get(&kw.to_key())
    }

    pub fn set(&mut self, kw: &KeyedWindow, value: T) {
        self.entries.insert(kw.to_key(), value);
    }

    pub fn delete(&mut self, kw: &KeyedWindow) -> Option<T> {
        self.entries.remove(&kw.to_key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every entry matching `pred`.
    pub fn evict(&mut self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, v)| pred(v))
            .map(|(k, _)| k.clone())
            .collect();
        keys.iter().filter_map(|k| self.entries.remove(k)).collect()
    }
}

/// Run `handler` over a fired window item according to `mode`.
///
/// Handler outputs inherit the input's window when they do not set one.
/// Items without a window bypass flush logic entirely.
pub fn flush_with_mode(
    mode: WindowFlushMode,
    bag: &mut BagOf<Item>,
    handler: &dyn Handler,
    item: Item,
    emit: &mut dyn FnMut(Item),
) -> Result<()> {
    let Some(kw) = item.keyed_window() else {
        return handler.process(item, emit);
    };

    let (previous, outs) = {
        let previous = match mode {
            WindowFlushMode::Discard => None,
            _ => bag.get(&kw).cloned(),
        };
        let input = match &previous {
            Some(prev) => Item {
                data: Value::pair(PREVIOUS, prev.data.clone(), CURRENT, item.data),
                ..item
            },
            None => item,
        };
        let mut outputs = Vec::new();
        handler.process(input, &mut |out: Item| {
            outputs.push(Item {
                window: out.window.or(Some(kw.window)),
                ..out
            })
        })?;
        (previous, outputs)
    };

    match mode {
        WindowFlushMode::Discard => {
            for out in outs {
                emit(out);
            }
        }
        WindowFlushMode::Accumulate { .. } => {
            for out in outs {
                bag.set(&kw, out.clone());
                emit(out);
            }
        }
        WindowFlushMode::AccumulatingAndRetracting { .. } => {
            let mut stale = previous;
            for out in outs {
                bag.set(&kw, out.clone());
                match stale.replace(out.clone()) {
                    Some(old) => emit(Item {
                        data: Value::pair(RETRACT, old.data, AGGREGATE, out.data),
                        kind: ItemType::RetractAndAggregate,
                        ..out
                    }),
                    None => emit(Item {
                        kind: ItemType::Aggregation,
                        ..out
                    }),
                }
            }
        }
    }
    Ok(())
}
