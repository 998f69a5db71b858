//! Executes a built DAG: one task per node over a pub/sub fabric.
//!
//! [`Interpreter::run`] registers a log per node up front, spawns every node
//! in an [`ExecutionGroup`](crate::group::ExecutionGroup) and blocks until all
//! of them finished or the first one failed. An interpreter runs once.
//!
//! ```no_run
//! use std::time::Duration;
//! use windflow::dag::DagBuilder;
//! use windflow::handler::{GenerateHandler, MergeHandler};
//! use windflow::node::*;
//! use windflow::testing::CollectHandler;
//! use windflow::{Context, Interpreter, Item};
//!
//! let items: Vec<Item> = (0..10).map(|i| Item::new("k", i)).collect();
//! let out = CollectHandler::new();
//!
//! let dag = DagBuilder::new();
//! dag.load(GenerateHandler::new(items), [with_name("numbers")])
//!     .window([with_fixed_window(Duration::from_secs(60))])
//!     .map(MergeHandler::sum(), [with_name("sum")])
//!     .map(out.clone(), [with_name("collect")]);
//!
//! Interpreter::new().run(&Context::background(), &dag.build()?)?;
//! # anyhow::Result::<()>::Ok(())
//! ```

mod nodes;
mod operators;

pub use operators::{MapOperator, WindowOperator};

use crate::config::{FabricKind, InterpreterConfig};
use crate::context::Context;
use crate::error::InterpreterError;
use crate::group::ExecutionGroup;
use crate::node::Node;
use crate::pubsub::{Message, PubSub};
use anyhow::{Context as _, Result};
use nodes::{Fabric, NodeRuntime, run_node};
use std::sync::{Arc, Mutex, PoisonError};

/// Lifecycle of an [`Interpreter`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum InterpreterState {
    #[default]
    New,
    Running,
    Finished,
    Error,
}

#[derive(Debug, Default)]
pub struct Interpreter {
    config: InterpreterConfig,
    state: Mutex<InterpreterState>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self { config, state: Mutex::new(InterpreterState::New) }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn state(&self) -> InterpreterState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, to: InterpreterState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(from = ?*state, to = ?to, "interpreter state");
        *state = to;
    }

    fn fabric(&self) -> Fabric {
        match self.config.fabric {
            FabricKind::Shared => Arc::new(PubSub::<Message>::with_poll_interval(self.config.poll_interval)),
            #[cfg(feature = "multi-fabric")]
            FabricKind::Multi => Arc::new(crate::pubsub::PubSubMulti::<Message>::with_poll_interval(
                self.config.channel_capacity,
                self.config.poll_interval,
            )),
            #[cfg(not(feature = "multi-fabric"))]
            FabricKind::Multi => {
                tracing::warn!("multi-fabric feature disabled, using the shared fabric");
                Arc::new(PubSub::<Message>::with_poll_interval(self.config.poll_interval))
            }
        }
    }

    /// Run `nodes` (a built DAG, sources first) to completion.
    ///
    /// Returns the first node failure, or an [`InterpreterError`] when the
    /// interpreter has already been used.
    pub fn run(&self, ctx: &Context, nodes: &[Arc<Node>]) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != InterpreterState::New {
                return Err(InterpreterError::NotInNewState(*state).into());
            }
            *state = InterpreterState::Running;
        }
        tracing::info!(nodes = nodes.len(), fabric = ?self.config.fabric, "interpreter running");

        let result = self.execute(ctx, nodes);
        self.transition(match result {
            Ok(()) => InterpreterState::Finished,
            Err(_) => InterpreterState::Error,
        });
        result
    }

    fn execute(&self, ctx: &Context, nodes: &[Arc<Node>]) -> Result<()> {
        let fabric = self.fabric();
        for node in nodes {
            fabric
                .register(node.name())
                .with_context(|| format!("registering node {}", node.name()))?;
        }
        fabric.wait_ready();

        let rt = NodeRuntime { fabric, config: self.config.clone() };
        let mut group = ExecutionGroup::new(ctx);
        for node in nodes {
            let rt = rt.clone();
            let node = Arc::clone(node);
            group.go(node.name().to_string(), move |ctx| run_node(&rt, &ctx, &node))?;
        }
        group.wait()
    }
}
