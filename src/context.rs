//! Cancellation contexts shared by node tasks.
//!
//! A [`Context`] is a cheap, clonable handle that becomes *done* when it, or
//! any of its ancestors, is cancelled or passes its deadline. Blocking
//! operations in the pub/sub fabric check it at the top of every iteration.
//!
//! ```
//! use windflow::Context;
//!
//! let root = Context::background();
//! let child = root.with_cancel();
//! assert!(!child.is_done());
//! root.cancel();
//! assert!(child.is_done());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<Context>,
}

impl Context {
    /// A root context that is never done unless cancelled.
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
                parent: None,
            }),
        }
    }

    /// Child context that can be cancelled independently of `self`.
    #[must_use]
    pub fn with_cancel(&self) -> Self {
        self.child(None)
    }

    /// Child context that is done once `timeout` elapsed.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.child(Some(Instant::now() + timeout))
    }

    fn child(&self, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel this context and all of its descendants.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        let mut cur = Some(self);
        while let Some(ctx) = cur {
            if ctx.inner.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            if ctx.inner.deadline.is_some_and(|d| Instant::now() >= d) {
                return true;
            }
            cur = ctx.inner.parent.as_ref();
        }
        false
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
