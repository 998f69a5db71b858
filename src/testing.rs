//! Testing utilities for windflow pipelines.
//!
//! - **Collectors**: [`CollectHandler`] records everything a Map node sees
//! - **Fixtures**: evenly spaced item streams ([`generate_items_every`])
//! - **Assertions**: compare collected items by payload, window or kind
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use windflow::dag::DagBuilder;
//! use windflow::handler::GenerateHandler;
//! use windflow::node::*;
//! use windflow::testing::*;
//! use windflow::{Context, Interpreter, Value};
//!
//! # fn main() -> anyhow::Result<()> {
//! let t0 = aligned_start(Duration::from_millis(100));
//! let items = generate_items_every("key", 4, t0, Duration::from_millis(10));
//! let out = CollectHandler::new();
//!
//! let dag = DagBuilder::new();
//! dag.load(GenerateHandler::new(items), [])
//!     .window([with_fixed_window(Duration::from_millis(100))])
//!     .map(out.clone(), []);
//! Interpreter::new().run(&Context::background(), &dag.build()?)?;
//!
//! assert_items_data_equal(
//!     &out.items(),
//!     &[Value::List(vec![0.into(), 1.into(), 2.into(), 3.into()])],
//! );
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod collect;
pub mod fixtures;

pub use assertions::*;
pub use collect::*;
pub use fixtures::*;
