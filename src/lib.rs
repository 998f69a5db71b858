//! # Windflow
//!
//! A **windowed streaming dataflow engine** for Rust in the style of the Apache Beam
//! windowing model. Windflow runs a DAG of load, window, map and join nodes inside one
//! process, connected by a publish/subscribe fabric, and aggregates events by key and
//! time window under configurable triggers and flush modes.
//!
//! ## Key Features
//!
//! - **Fluent DAG builder** - declare load/window/map/join nodes, validated by a topological sort
//! - **Window policies** - fixed, sliding and session windows (sessions merge as data arrives)
//! - **Triggers** - at period, at window item count, at watermark, and `AnyOf`/`AllOf` combinations
//! - **Flush modes** - discard, accumulate, and accumulate-and-retract
//! - **Pub/sub fabric** - offset-addressed, replayable logs with three interchangeable implementations
//! - **Cancellation** - a shared context stops every node on the first failure
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use windflow::*;
//! use windflow::handler::{GenerateHandler, MergeHandler};
//! use windflow::node::*;
//! use windflow::testing::CollectHandler;
//! use windflow::trigger::TriggerDescription;
//!
//! # fn main() -> anyhow::Result<()> {
//! let events: Vec<Item> = (0..100).map(|i| Item::new("sensor-1", i)).collect();
//! let totals = CollectHandler::new();
//!
//! let dag = DagBuilder::new();
//! dag.load(GenerateHandler::new(events), [with_name("events")])
//!     .window([
//!         with_name("per-second"),
//!         with_fixed_window(Duration::from_secs(1)),
//!         with_triggers([TriggerDescription::at_watermark()]),
//!     ])
//!     .map(MergeHandler::sum(), [with_name("sum"), with_accumulate()])
//!     .map(totals.clone(), [with_name("collect")]);
//!
//! let dag = dag.build()?;
//! println!("{dag}");
//! Interpreter::new().run(&Context::background(), &dag)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Items and values
//!
//! An [`Item`] is a keyed, timestamped [`Value`]. Once windowed it also carries its
//! [`Window`]; the pair of key and window is a [`KeyedWindow`], the unit of buffered and
//! triggered state.
//!
//! ### Nodes
//!
//! - **Load** calls its [`Handler`](handler::Handler) once and publishes what it emits,
//!   followed by a final watermark.
//! - **Window** buffers items per keyed window and emits each window as one item holding
//!   a list when its trigger fires.
//! - **Map** applies a handler to every item, combining fired windows with earlier
//!   results according to its [`WindowFlushMode`](flush::WindowFlushMode).
//! - **Join** forwards every message of all its inputs.
//!
//! ### Execution
//!
//! [`Interpreter::run`] starts one thread per node. Nodes talk only through the
//! [`pubsub`] fabric; the first failing node cancels the shared [`Context`] and its
//! error is returned.

pub mod buffer;
pub mod config;
pub mod context;
pub mod dag;
pub mod error;
pub mod flush;
pub mod group;
pub mod handler;
pub mod interpreter;
pub mod node;
pub mod node_id;
pub mod pubsub;
pub mod sink;
pub mod testing;
pub mod trigger;
pub mod value;
pub mod window;
pub mod windowing;

pub use config::{FabricKind, InterpreterConfig};
pub use context::Context;
pub use dag::{Dag, DagBuilder};
pub use error::{DagError, InterpreterError};
pub use interpreter::{Interpreter, InterpreterState};
pub use node_id::NodeId;
pub use value::Value;
pub use window::{Item, ItemType, KeyedWindow, TimestampNs, Window};
