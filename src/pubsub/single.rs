use super::log::{Log, subscribe_loop};
use super::{Envelope, PubSubError};
use crate::context::Context;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// One unkeyed log with its own lock, for single-producer streams.
pub struct PubSubSingle<T> {
    name: String,
    log: Mutex<Log<T>>,
    changed: Condvar,
    poll_interval: Duration,
}

impl<T: Envelope> PubSubSingle<T> {
    /// `name` only labels errors and traces.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_poll_interval(name, Duration::from_millis(10))
    }

    pub fn with_poll_interval(name: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            name: name.into(),
            log: Mutex::new(Log::default()),
            changed: Condvar::new(),
            poll_interval,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).is_finished()
    }

    pub fn publish(&self, ctx: &Context, msg: T) -> Result<(), PubSubError> {
        if msg.offset() != 0 {
            return Err(PubSubError::PublishWithOffset(msg.offset()));
        }
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(&self.name, msg)?;
        self.changed.notify_all();
        Ok(())
    }

    pub fn finish(&self, ctx: &Context) -> Result<(), PubSubError> {
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close(&self.name)?;
        tracing::trace!(name = %self.name, "finished log");
        self.changed.notify_all();
        Ok(())
    }

    pub fn subscribe(
        &self,
        ctx: &Context,
        from_offset: i64,
        f: &mut dyn FnMut(T) -> anyhow::Result<()>,
    ) -> Result<(), PubSubError> {
        subscribe_loop(
            ctx,
            self.poll_interval,
            &self.log,
            &self.changed,
            &self.name,
            |log: &Log<T>| Some(log),
            from_offset,
            f,
        )
    }
}
