//! User computation plugged into Load and Map nodes.
//!
//! A [`Handler`] receives one [`Item`] at a time and emits zero or more
//! items through the `emit` callback. Load nodes call [`Handler::process`]
//! once with an empty item; Map nodes call it for every incoming item and
//! route retractions to [`Handler::retract`].
//!
//! Stock handlers:
//! - [`handler_fn`] - adapt a closure
//! - [`GenerateHandler`] - emit a fixed list of items (typical Load handler)
//! - [`MergeHandler`] - fold windowed lists and accumulate composites
//! - [`LogHandler`] - log every item, then forward it or delegate
//!
//! ```
//! use windflow::handler::{Handler, MergeHandler};
//! use windflow::{Item, Value};
//!
//! let sum = MergeHandler::sum();
//! let mut out = Vec::new();
//! let window = Item::new("k", Value::List(vec![1.into(), 2.into(), 3.into()]));
//! sum.process(window, &mut |i| out.push(i))?;
//! assert_eq!(out[0].data, Value::from(6));
//! # anyhow::Result::<()>::Ok(())
//! ```

use crate::value::{AGGREGATE, CURRENT, PREVIOUS, RETRACT, Value};
use crate::window::{Item, ItemType};
use anyhow::{Context, Result, bail};
use std::sync::Arc;

/// Processes items for a Load or Map node.
pub trait Handler: Send + Sync {
    /// Handle one item; any error is terminal for the node.
    fn process(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()>;

    /// Handle a `RetractAndAggregate` item carrying `{Retract, Aggregate}`.
    fn retract(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn process(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        (**self).process(item, emit)
    }

    fn retract(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        (**self).retract(item, emit)
    }
}

/// Closure-backed handler, see [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Adapt a closure into a [`Handler`]. Retractions are forwarded unchanged.
///
/// ```
/// use windflow::handler::{Handler, handler_fn};
/// use windflow::{Item, Value};
///
/// let upper = handler_fn(|item: Item, emit: &mut dyn FnMut(Item)| {
///     let s = item.data.as_str().unwrap_or_default().to_uppercase();
///     emit(Item { data: Value::from(s), ..item });
///     Ok(())
/// });
/// let mut out = Vec::new();
/// upper.process(Item::new("k", "abc"), &mut |i| out.push(i))?;
/// assert_eq!(out[0].data, Value::from("ABC"));
/// # anyhow::Result::<()>::Ok(())
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(Item, &mut dyn FnMut(Item)) -> Result<()> + Send + Sync,
{
    FnHandler { f }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(Item, &mut dyn FnMut(Item)) -> Result<()> + Send + Sync,
{
    fn process(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        (self.f)(item, emit)
    }

    fn retract(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        emit(item);
        Ok(())
    }
}

/// Load handler that emits a fixed list of items.
#[derive(Clone, Debug, Default)]
pub struct GenerateHandler {
    items: Vec<Item>,
}

impl GenerateHandler {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }
}

impl Handler for GenerateHandler {
    fn process(&self, _item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        for item in &self.items {
            emit(item.clone());
        }
        Ok(())
    }

    fn retract(&self, _item: Item, _emit: &mut dyn FnMut(Item)) -> Result<()> {
        bail!("generate handler is a source and cannot retract")
    }
}

type CombineFn = Arc<dyn Fn(&Value, &Value) -> Result<Value> + Send + Sync>;

/// Aggregating handler built from a pairwise `combine` and a `retract` function.
///
/// - a `List` payload (a fired window) is folded left with `combine`;
/// - a `{Previous, Current}` payload (an accumulate hit) combines the previous
///   aggregate with the folded current window;
/// - any other payload passes through as its own aggregate.
///
/// Retractions receive `{Retract, Aggregate}` and emit `retract(aggregate, retract)`,
/// i.e. the correction to apply downstream.
#[derive(Clone)]
pub struct MergeHandler {
    combine: CombineFn,
    retract: CombineFn,
}

impl MergeHandler {
    pub fn new<C, R>(combine: C, retract: R) -> Self
    where
        C: Fn(&Value, &Value) -> Result<Value> + Send + Sync + 'static,
        R: Fn(&Value, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            combine: Arc::new(combine),
            retract: Arc::new(retract),
        }
    }

    /// Numeric sum; retraction yields `aggregate - retract`.
    pub fn sum() -> Self {
        Self::new(
            |a, b| Ok(Value::number(a.expect_f64()? + b.expect_f64()?)),
            |agg, stale| Ok(Value::number(agg.expect_f64()? - stale.expect_f64()?)),
        )
    }

    fn fold(&self, data: &Value) -> Result<Value> {
        let Value::List(values) = data else {
            return Ok(data.clone());
        };
        let mut iter = values.iter();
        let Some(first) = iter.next() else {
            bail!("cannot merge an empty window");
        };
        iter.try_fold(first.clone(), |acc, v| (self.combine)(&acc, v))
    }
}

impl Handler for MergeHandler {
    fn process(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        let merged = match (item.data.get(PREVIOUS), item.data.get(CURRENT)) {
            (Some(previous), Some(current)) => {
                let current = self.fold(current)?;
                (self.combine)(previous, &current)
            }
            _ => self.fold(&item.data),
        }
        .with_context(|| format!("merging item with key {:?}", item.key))?;

        emit(Item {
            data: merged,
            kind: ItemType::Aggregation,
            ..item
        });
        Ok(())
    }

    fn retract(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        let (Some(stale), Some(aggregate)) = (item.data.get(RETRACT), item.data.get(AGGREGATE)) else {
            bail!("retraction for key {:?} is missing Retract/Aggregate", item.key);
        };
        let delta = (self.retract)(aggregate, stale)?;
        emit(Item {
            data: delta,
            kind: ItemType::Aggregation,
            ..item
        });
        Ok(())
    }
}

/// Logs every item at `info` under a label, then delegates or forwards.
pub struct LogHandler {
    label: String,
    inner: Option<Arc<dyn Handler>>,
}

impl LogHandler {
    /// A tee that forwards items unchanged.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), inner: None }
    }

    /// Log, then hand the item to `inner`.
    pub fn wrap(label: impl Into<String>, inner: Arc<dyn Handler>) -> Self {
        Self { label: label.into(), inner: Some(inner) }
    }
}

impl Handler for LogHandler {
    fn process(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        tracing::info!(
            label = %self.label,
            key = %item.key,
            window = ?item.window,
            kind = ?item.kind,
            data = %item.data,
            "process"
        );
        match &self.inner {
            Some(inner) => inner.process(item, emit),
            None => {
                emit(item);
                Ok(())
            }
        }
    }

    fn retract(&self, item: Item, emit: &mut dyn FnMut(Item)) -> Result<()> {
        tracing::info!(label = %self.label, key = %item.key, data = %item.data, "retract");
        match &self.inner {
            Some(inner) => inner.retract(item, emit),
            None => {
                emit(item);
                Ok(())
            }
        }
    }
}
