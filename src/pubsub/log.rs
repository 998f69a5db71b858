use super::{Envelope, PubSubError};
use crate::context::Context;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Append-only message log for one key.
#[derive(Debug)]
pub(crate) struct Log<T> {
    messages: Vec<T>,
    finished: bool,
}

impl<T> Default for Log<T> {
    fn default() -> Self {
        Self { messages: Vec::new(), finished: false }
    }
}

impl<T: Envelope> Log<T> {
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    /// Next offset to be assigned.
    pub(crate) fn next_offset(&self) -> i64 {
        self.messages.len() as i64
    }

    pub(crate) fn append(&mut self, key: &str, msg: T) -> Result<i64, PubSubError> {
        if self.finished {
            return Err(PubSubError::Finished(key.to_string()));
        }
        let offset = self.next_offset();
        self.messages.push(msg.with_offset(offset));
        Ok(offset)
    }

    /// Append an already-numbered message (channel fabric history).
    pub(crate) fn push_numbered(&mut self, msg: T) {
        if msg.is_finished() {
            self.finished = true;
        }
        self.messages.push(msg);
    }

    pub(crate) fn close(&mut self, key: &str) -> Result<i64, PubSubError> {
        let offset = self.append(key, T::finished(key))?;
        self.finished = true;
        Ok(offset)
    }

    /// Index of the first message to deliver for `from_offset`.
    fn start_position(&self, from_offset: i64) -> Result<usize, PubSubError> {
        match from_offset {
            0 => Ok(0),
            -1 => Ok(self.messages.len().saturating_sub(1)),
            n => self
                .messages
                .iter()
                .position(|m| m.offset() >= n)
                .ok_or(PubSubError::OffsetNotFound(n)),
        }
    }
}

/// Replay-then-tail loop shared by every fabric.
///
/// `view` locates the log inside the guarded state. The lock is released
/// while `f` runs so callbacks may publish to the same fabric.
#[allow(clippy::too_many_arguments)]
pub(crate) fn subscribe_loop<G, T, V>(
    ctx: &Context,
    poll_interval: Duration,
    state: &Mutex<G>,
    changed: &Condvar,
    key: &str,
    view: V,
    from_offset: i64,
    f: &mut dyn FnMut(T) -> anyhow::Result<()>,
) -> Result<(), PubSubError>
where
    T: Envelope,
    V: Fn(&G) -> Option<&Log<T>>,
{
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);

    // Wait for the first message.
    loop {
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        let log = view(&*guard).ok_or_else(|| PubSubError::NoPublisher(key.to_string()))?;
        if log.len() > 0 {
            break;
        }
        guard = changed
            .wait_timeout(guard, poll_interval)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }

    let mut pos = match view(&*guard) {
        Some(log) => log.start_position(from_offset)?,
        None => return Err(PubSubError::NoPublisher(key.to_string())),
    };

    loop {
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        let batch: Vec<T> = match view(&*guard) {
            Some(log) if pos < log.len() => log.messages[pos..].to_vec(),
            Some(_) => Vec::new(),
            None => return Err(PubSubError::NoPublisher(key.to_string())),
        };

        if batch.is_empty() {
            guard = changed
                .wait_timeout(guard, poll_interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            continue;
        }

        drop(guard);
        for msg in batch {
            if msg.is_finished() {
                tracing::trace!(key, "subscription reached end of log");
                return Ok(());
            }
            if ctx.is_done() {
                return Err(PubSubError::ContextDone);
            }
            f(msg).map_err(PubSubError::HandlerReturnErr)?;
            pos += 1;
        }
        guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    }
}
