//! Collecting handlers.

use crate::handler::Handler;
use crate::value::Value;
use crate::window::Item;
use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};

/// Records every item and retraction it sees, then forwards it unchanged.
///
/// Clones share the same record, so keep one clone and hand another to the DAG.
#[derive(Clone, Debug, Default)]
pub struct CollectHandler {
    seen: Arc<Mutex<Vec<Item>>>,
}

impl CollectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything seen so far, in arrival order.
    pub fn items(&self) -> Vec<Item> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn data(&self) -> Vec<Value> {
        self.items().into_iter().map(|i| i.data).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn record(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.clone());
        emit(item);
        Ok(())
    }
}

impl Handler for CollectHandler {
    fn process(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        self.record(item, emit)
    }

    fn retract(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        self.record(item, emit)
    }
}
