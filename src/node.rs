//! DAG nodes and their per-node policy context.
//!
//! Nodes are created once by the [`DagBuilder`](crate::dag::DagBuilder) and
//! never mutated. Each carries a [`NodeContext`]: its scoped name plus the
//! window, trigger and flush-mode policy that Window and Map nodes consult.
//!
//! Policies are set with [`NodeOption`]s:
//!
//! ```
//! use std::time::Duration;
//! use windflow::node::*;
//! use windflow::trigger::TriggerDescription;
//!
//! let ctx = NodeContext::from_options([
//!     with_name("per-minute"),
//!     with_fixed_window(Duration::from_secs(60)),
//!     with_triggers([TriggerDescription::at_watermark()]),
//!     with_accumulate(),
//! ]);
//! assert_eq!(ctx.name(), "per-minute");
//! ```

use crate::flush::WindowFlushMode;
use crate::handler::Handler;
use crate::trigger::TriggerDescription;
use crate::windowing::WindowDescription;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Name and policies of a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeContext {
    pub(crate) name: String,
    pub(crate) window: WindowDescription,
    pub(crate) trigger: TriggerDescription,
    pub(crate) flush_mode: WindowFlushMode,
}

impl NodeContext {
    pub fn from_options(options: impl IntoIterator<Item = NodeOption>) -> Self {
        let mut ctx = Self::default();
        for opt in options {
            opt.apply(&mut ctx);
        }
        ctx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> &WindowDescription {
        &self.window
    }

    pub fn trigger(&self) -> &TriggerDescription {
        &self.trigger
    }

    pub fn flush_mode(&self) -> WindowFlushMode {
        self.flush_mode
    }
}

/// A builder option mutating a [`NodeContext`].
pub struct NodeOption(Box<dyn FnOnce(&mut NodeContext) + Send>);

impl NodeOption {
    pub fn new(f: impl FnOnce(&mut NodeContext) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn apply(self, ctx: &mut NodeContext) {
        (self.0)(ctx)
    }
}

pub fn with_name(name: impl Into<String>) -> NodeOption {
    let name = name.into();
    NodeOption::new(move |ctx| ctx.name = name)
}

pub fn with_window(window: WindowDescription) -> NodeOption {
    NodeOption::new(move |ctx| ctx.window = window)
}

pub fn with_fixed_window(width: Duration) -> NodeOption {
    with_window(WindowDescription::Fixed { width })
}

pub fn with_sliding_window(width: Duration, period: Duration) -> NodeOption {
    with_window(WindowDescription::Sliding { width, period })
}

pub fn with_session_window(gap: Duration) -> NodeOption {
    with_window(WindowDescription::Session { gap })
}

/// Set the trigger policy; several descriptions must all hold (`AllOf`).
pub fn with_triggers(triggers: impl IntoIterator<Item = TriggerDescription>) -> NodeOption {
    let mut triggers: Vec<TriggerDescription> = triggers.into_iter().collect();
    NodeOption::new(move |ctx| {
        ctx.trigger = match triggers.len() {
            0 => TriggerDescription::default(),
            1 => triggers.remove(0),
            _ => TriggerDescription::AllOf(triggers),
        }
    })
}

pub fn with_flush_mode(mode: WindowFlushMode) -> NodeOption {
    NodeOption::new(move |ctx| ctx.flush_mode = mode)
}

pub fn with_discard() -> NodeOption {
    with_flush_mode(WindowFlushMode::Discard)
}

pub fn with_accumulate() -> NodeOption {
    with_flush_mode(WindowFlushMode::Accumulate { allow_late_arrival: true })
}

pub fn with_accumulating_and_retracting() -> NodeOption {
    with_flush_mode(WindowFlushMode::AccumulatingAndRetracting { allow_late_arrival: true })
}

pub struct DoLoad {
    pub ctx: NodeContext,
    pub on_load: Arc<dyn Handler>,
}

pub struct DoWindow {
    pub ctx: NodeContext,
    pub input: Arc<Node>,
}

pub struct DoMap {
    pub ctx: NodeContext,
    pub on_map: Arc<dyn Handler>,
    pub input: Arc<Node>,
}

pub struct DoJoin {
    pub ctx: NodeContext,
    pub inputs: Vec<Arc<Node>>,
}

/// A computation node. Identity is by [`name`](Node::name).
pub enum Node {
    Load(DoLoad),
    Window(DoWindow),
    Map(DoMap),
    Join(DoJoin),
}

impl Node {
    pub fn ctx(&self) -> &NodeContext {
        match self {
            Node::Load(n) => &n.ctx,
            Node::Window(n) => &n.ctx,
            Node::Map(n) => &n.ctx,
            Node::Join(n) => &n.ctx,
        }
    }

    pub fn name(&self) -> &str {
        self.ctx().name()
    }

    /// Upstream nodes, in declaration order.
    pub fn inputs(&self) -> Vec<&Arc<Node>> {
        match self {
            Node::Load(_) => Vec::new(),
            Node::Window(n) => vec![&n.input],
            Node::Map(n) => vec![&n.input],
            Node::Join(n) => n.inputs.iter().collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Load(_) => "load",
            Node::Window(_) => "window",
            Node::Map(_) => "map",
            Node::Join(_) => "join",
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("inputs", &self.inputs().iter().map(|n| n.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
