use super::operators::{MapOperator, WindowOperator};
use crate::config::InterpreterConfig;
use crate::context::Context;
use crate::group::ExecutionGroup;
use crate::node::{DoJoin, DoLoad, DoMap, DoWindow, Node};
use crate::pubsub::{Message, PubSubApi};
use crate::trigger::Tickers;
use crate::window::{Item, TimestampNs};
use anyhow::{Context as _, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) type Fabric = Arc<dyn PubSubApi<Message>>;

/// Everything a node task needs besides its node.
#[derive(Clone)]
pub(crate) struct NodeRuntime {
    pub(crate) fabric: Fabric,
    pub(crate) config: InterpreterConfig,
}

impl NodeRuntime {
    fn publish_items(&self, ctx: &Context, name: &str, items: Vec<Item>) -> Result<()> {
        for item in items {
            self.fabric
                .publish(ctx, name, Message::item(item))
                .with_context(|| format!("node {name}: publishing item"))?;
        }
        Ok(())
    }

    fn publish_watermark(&self, ctx: &Context, name: &str, ts: TimestampNs) -> Result<()> {
        self.fabric
            .publish(ctx, name, Message::watermark(ts))
            .with_context(|| format!("node {name}: publishing watermark"))
    }

    fn finish(&self, ctx: &Context, name: &str) -> Result<()> {
        self.fabric
            .finish(ctx, name)
            .with_context(|| format!("node {name}: finishing"))
    }

    /// Subscribe to `input` from the beginning, dispatching items and watermarks.
    fn consume<I, W>(&self, ctx: &Context, name: &str, input: &str, mut on_item: I, mut on_watermark: W) -> Result<()>
    where
        I: FnMut(Item) -> Result<()>,
        W: FnMut(TimestampNs) -> Result<()>,
    {
        self.fabric
            .subscribe(ctx, input, 0, &mut |msg: Message| {
                if let Some(item) = msg.item {
                    on_item(item)?;
                }
                if let Some(ts) = msg.watermark {
                    on_watermark(ts)?;
                }
                Ok(())
            })
            .with_context(|| format!("node {name}: consuming {input}"))
    }
}

pub(crate) fn run_node(rt: &NodeRuntime, ctx: &Context, node: &Node) -> Result<()> {
    tracing::debug!(node = node.name(), kind = node.kind(), "node started");
    let result = match node {
        Node::Load(n) => do_load(rt, ctx, n),
        Node::Window(n) => do_window(rt, ctx, n),
        Node::Map(n) => do_map(rt, ctx, n),
        Node::Join(n) => do_join(rt, ctx, n),
    };
    match &result {
        Ok(()) => tracing::debug!(node = node.name(), "node finished"),
        Err(e) => tracing::warn!(node = node.name(), error = %format!("{e:#}"), "node failed"),
    }
    result
}

pub(crate) fn now_ns() -> TimestampNs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| TimestampNs::try_from(d.as_nanos()).unwrap_or(TimestampNs::MAX))
        .unwrap_or_default()
}

fn do_load(rt: &NodeRuntime, ctx: &Context, n: &DoLoad) -> Result<()> {
    let name = n.ctx.name();
    // emit cannot fail, so the first publish error is kept and later items are skipped
    let mut publish_error = None;
    n.on_load
        .process(Item::default(), &mut |mut item| {
            if publish_error.is_some() {
                return;
            }
            if item.event_time == 0 {
                item.event_time = now_ns();
            }
            if let Err(e) = rt.fabric.publish(ctx, name, Message::item(item)) {
                publish_error = Some(e);
            }
        })
        .with_context(|| format!("node {name}: load handler"))?;
    if let Some(e) = publish_error {
        return Err(e).with_context(|| format!("node {name}: publishing item"));
    }

    rt.publish_watermark(ctx, name, TimestampNs::MAX)?;
    rt.finish(ctx, name)
}

fn do_window(rt: &NodeRuntime, ctx: &Context, n: &DoWindow) -> Result<()> {
    let name = n.ctx.name().to_string();
    let op = Arc::new(Mutex::new(
        WindowOperator::from_context(&n.ctx).with_force_flush_on_finish(rt.config.force_flush_on_finish),
    ));

    let mut tickers = Tickers::new();
    tickers.register(n.ctx.trigger());
    {
        let op = Arc::clone(&op);
        let rt = rt.clone();
        let tick_ctx = ctx.clone();
        let name = name.clone();
        tickers.start(
            ctx,
            Arc::new(move |period| {
                let mut op = op.lock().unwrap_or_else(PoisonError::into_inner);
                let fired = op.on_tick(period);
                rt.publish_items(&tick_ctx, &name, fired)
            }),
        )?;
    }

    let consumed = rt.consume(
        ctx,
        &name,
        n.input.name(),
        |item| {
            let mut op = op.lock().unwrap_or_else(PoisonError::into_inner);
            let fired = op.on_item(item);
            rt.publish_items(ctx, &name, fired)
        },
        |ts| {
            let mut op = op.lock().unwrap_or_else(PoisonError::into_inner);
            let fired = op.on_watermark(ts);
            rt.publish_items(ctx, &name, fired)?;
            rt.publish_watermark(ctx, &name, ts)
        },
    );
    let stopped = tickers.stop().with_context(|| format!("node {name}: ticker"));
    consumed?;
    stopped?;

    let remaining = op.lock().unwrap_or_else(PoisonError::into_inner).on_finish();
    rt.publish_items(ctx, &name, remaining)?;
    rt.finish(ctx, &name)
}

fn do_map(rt: &NodeRuntime, ctx: &Context, n: &DoMap) -> Result<()> {
    let name = n.ctx.name();
    let op = Mutex::new(MapOperator::new(Arc::clone(&n.on_map), n.ctx.flush_mode()));

    rt.consume(
        ctx,
        name,
        n.input.name(),
        |item| {
            let out = op.lock().unwrap_or_else(PoisonError::into_inner).on_item(item)?;
            rt.publish_items(ctx, name, out)
        },
        |ts| {
            op.lock().unwrap_or_else(PoisonError::into_inner).on_watermark(ts);
            rt.publish_watermark(ctx, name, ts)
        },
    )?;
    rt.finish(ctx, name)
}

fn do_join(rt: &NodeRuntime, ctx: &Context, n: &DoJoin) -> Result<()> {
    let name = n.ctx.name().to_string();
    let mut group = ExecutionGroup::new(ctx);
    for input in &n.inputs {
        let rt = rt.clone();
        let name = name.clone();
        let input = input.name().to_string();
        group.go(format!("{name}<-{input}"), move |ctx| {
            rt.fabric
                .subscribe(&ctx, &input, 0, &mut |msg: Message| {
                    let forwarded = Message { offset: 0, ..msg };
                    rt.fabric.publish(&ctx, &name, forwarded)?;
                    Ok(())
                })
                .with_context(|| format!("node {name}: forwarding {input}"))
        })?;
    }
    group.wait()?;
    rt.finish(ctx, &name)
}
