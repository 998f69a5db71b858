//! In-process publish/subscribe fabric connecting DAG nodes.
//!
//! Every node owns one append-only log, keyed by node name. Offsets are
//! assigned by the log (`0..N-1` in publish order); a log ends with a
//! *finished* sentinel after which nothing more can be published.
//!
//! Subscribers replay from an offset and then tail the log:
//! - `0` starts at the earliest message,
//! - `-1` starts at the latest message at subscribe time,
//! - `N` starts at the first message with offset `>= N`.
//!
//! Implementations:
//! - [`PubSub`] - all keys behind one mutex and condition variable
//! - [`PubSubSingle`] - one unkeyed log
//! - [`PubSubMulti`] - one [`PubSubChan`] per key, fed by a bounded channel
//!   and a background fan-out thread (feature `multi-fabric`)
//!
//! ```
//! use windflow::pubsub::{Message, PubSub, PubSubApi};
//! use windflow::{Context, Item};
//!
//! let ctx = Context::background();
//! let ps = PubSub::<Message>::new();
//! ps.register("numbers")?;
//! for i in 0..3 {
//!     ps.publish(&ctx, "numbers", Message::item(Item::new("k", i)))?;
//! }
//! ps.finish(&ctx, "numbers")?;
//!
//! let mut offsets = Vec::new();
//! ps.subscribe(&ctx, "numbers", 0, &mut |m: Message| {
//!     offsets.push(m.offset);
//!     Ok(())
//! })?;
//! assert_eq!(offsets, vec![0, 1, 2]);
//! # anyhow::Result::<()>::Ok(())
//! ```

mod error;
mod log;
#[cfg(feature = "multi-fabric")]
mod multi;
mod shared;
mod single;

pub use error::PubSubError;
#[cfg(feature = "multi-fabric")]
pub use multi::{PubSubChan, PubSubMulti};
pub use shared::PubSub;
pub use single::PubSubSingle;

use crate::context::Context;
use crate::window::{Item, TimestampNs};
use serde::{Deserialize, Serialize};

/// A message type a log can carry.
pub trait Envelope: Clone + Send + Sync + 'static {
    fn offset(&self) -> i64;

    #[must_use]
    fn with_offset(self, offset: i64) -> Self;

    /// The end-of-log sentinel for `key`.
    fn finished(key: &str) -> Self;

    fn is_finished(&self) -> bool;
}

/// Contract shared by the keyed fabrics.
pub trait PubSubApi<T: Envelope>: Send + Sync {
    /// Ensure a log exists for `key`. Fails if it was already finished.
    fn register(&self, key: &str) -> Result<(), PubSubError>;

    fn publish(&self, ctx: &Context, key: &str, msg: T) -> Result<(), PubSubError>;

    /// Append the finished sentinel; later publishes fail.
    fn finish(&self, ctx: &Context, key: &str) -> Result<(), PubSubError>;

    /// Deliver messages from `from_offset` until the sentinel, an error or cancellation.
    fn subscribe(
        &self,
        ctx: &Context,
        key: &str,
        from_offset: i64,
        f: &mut dyn FnMut(T) -> anyhow::Result<()>,
    ) -> Result<(), PubSubError>;

    /// Block until every registered key can accept and deliver messages.
    fn wait_ready(&self) {}
}

/// What flows between nodes: an item, a watermark, or the end of a stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub offset: i64,
    pub key: String,
    pub item: Option<Item>,
    pub watermark: Option<TimestampNs>,
    pub finished: bool,
}

impl Message {
    pub fn item(item: Item) -> Self {
        Self { item: Some(item), ..Default::default() }
    }

    pub fn watermark(ts: TimestampNs) -> Self {
        Self { watermark: Some(ts), ..Default::default() }
    }
}

impl Envelope for Message {
    fn offset(&self) -> i64 {
        self.offset
    }

    fn with_offset(self, offset: i64) -> Self {
        Self { offset, ..self }
    }

    fn finished(key: &str) -> Self {
        Self { key: key.to_string(), finished: true, ..Default::default() }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
