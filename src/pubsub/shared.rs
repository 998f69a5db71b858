use super::log::{Log, subscribe_loop};
use super::{Envelope, PubSubApi, PubSubError};
use crate::context::Context;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Keyed logs sharing one mutex and one condition variable.
///
/// Every publish wakes every subscriber, which then re-checks its own key.
pub struct PubSub<T> {
    logs: Mutex<HashMap<String, Log<T>>>,
    changed: Condvar,
    poll_interval: Duration,
}

impl<T: Envelope> Default for PubSub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Envelope> PubSub<T> {
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(10))
    }

    /// `poll_interval` bounds how long a blocked subscriber goes without re-checking its context.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            changed: Condvar::new(),
            poll_interval,
        }
    }

    pub fn is_finished(&self, key: &str) -> bool {
        let logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        logs.get(key).is_some_and(Log::is_finished)
    }
}

impl<T: Envelope> PubSubApi<T> for PubSub<T> {
    fn register(&self, key: &str) -> Result<(), PubSubError> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let log = logs.entry(key.to_string()).or_default();
        if log.is_finished() {
            return Err(PubSubError::Finished(key.to_string()));
        }
        tracing::trace!(key, "registered log");
        Ok(())
    }

    fn publish(&self, ctx: &Context, key: &str, msg: T) -> Result<(), PubSubError> {
        if msg.offset() != 0 {
            return Err(PubSubError::PublishWithOffset(msg.offset()));
        }
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let log = logs
            .get_mut(key)
            .ok_or_else(|| PubSubError::NoPublisher(key.to_string()))?;
        log.append(key, msg)?;
        drop(logs);
        self.changed.notify_all();
        Ok(())
    }

    fn finish(&self, ctx: &Context, key: &str) -> Result<(), PubSubError> {
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let log = logs
            .get_mut(key)
            .ok_or_else(|| PubSubError::NoPublisher(key.to_string()))?;
        let offset = log.close(key)?;
        drop(logs);
        tracing::trace!(key, offset, "finished log");
        self.changed.notify_all();
        Ok(())
    }

    fn subscribe(
        &self,
        ctx: &Context,
        key: &str,
        from_offset: i64,
        f: &mut dyn FnMut(T) -> anyhow::Result<()>,
    ) -> Result<(), PubSubError> {
        subscribe_loop(
            ctx,
            self.poll_interval,
            &self.logs,
            &self.changed,
            key,
            |logs: &HashMap<String, Log<T>>| logs.get(key),
            from_offset,
            f,
        )
    }
}
