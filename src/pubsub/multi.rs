use super::log::{Log, subscribe_loop};
use super::{Envelope, PubSubApi, PubSubError};
use crate::context::Context;
use crossbeam_channel::{Sender, bounded};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Publisher<T> {
    tx: Sender<T>,
    next_offset: i64,
    closed: bool,
}

/// One key's channel: publishers push into a bounded channel, a fan-out
/// thread drains it into a history log that subscribers replay and tail.
pub struct PubSubChan<T> {
    key: String,
    publisher: Mutex<Option<Publisher<T>>>,
    history: Arc<(Mutex<Log<T>>, Condvar)>,
    ready: Arc<(Mutex<bool>, Condvar)>,
    worker: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl<T: Envelope> PubSubChan<T> {
    pub fn new(key: impl Into<String>, capacity: usize, poll_interval: Duration) -> Result<Self, PubSubError> {
        let key = key.into();
        let (tx, rx) = bounded::<T>(capacity);
        let history: Arc<(Mutex<Log<T>>, Condvar)> = Arc::new((Mutex::new(Log::default()), Condvar::new()));
        let ready = Arc::new((Mutex::new(false), Condvar::new()));

        let worker = {
            let history = Arc::clone(&history);
            let ready = Arc::clone(&ready);
            thread::Builder::new().name(format!("fanout-{key}")).spawn(move || {
                {
                    let (flag, cv) = &*ready;
                    *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
                    cv.notify_all();
                }
                let (log, changed) = &*history;
                for msg in rx {
                    let done = msg.is_finished();
                    log.lock().unwrap_or_else(PoisonError::into_inner).push_numbered(msg);
                    changed.notify_all();
                    if done {
                        break;
                    }
                }
            })?
        };

        Ok(Self {
            key,
            publisher: Mutex::new(Some(Publisher { tx, next_offset: 0, closed: false })),
            history,
            ready,
            worker: Mutex::new(Some(worker)),
            poll_interval,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(|p| p.closed)
    }

    /// Block until the fan-out thread is running.
    pub fn wait_ready(&self) {
        let (flag, cv) = &*self.ready;
        let mut started = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*started {
            started = cv.wait(started).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn send(&self, msg: T, closing: bool) -> Result<(), PubSubError> {
        let mut guard = self.publisher.lock().unwrap_or_else(PoisonError::into_inner);
        let publisher = match guard.as_mut() {
            Some(p) if !p.closed => p,
            _ => return Err(PubSubError::Finished(self.key.clone())),
        };
        let offset = publisher.next_offset;
        // Blocks while the channel is full; the fan-out thread always drains it.
        publisher
            .tx
            .send(msg.with_offset(offset))
            .map_err(|_| PubSubError::Finished(self.key.clone()))?;
        publisher.next_offset += 1;
        publisher.closed = closing;
        Ok(())
    }

    pub fn publish(&self, ctx: &Context, msg: T) -> Result<(), PubSubError> {
        if msg.offset() != 0 {
            return Err(PubSubError::PublishWithOffset(msg.offset()));
        }
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        self.send(msg, false)
    }

    pub fn finish(&self, ctx: &Context) -> Result<(), PubSubError> {
        if ctx.is_done() {
            return Err(PubSubError::ContextDone);
        }
        self.send(T::finished(&self.key), true)?;
        tracing::trace!(key = %self.key, "finished channel");
        Ok(())
    }

    pub fn subscribe(
        &self,
        ctx: &Context,
        from_offset: i64,
        f: &mut dyn FnMut(T) -> anyhow::Result<()>,
    ) -> Result<(), PubSubError> {
        let (log, changed) = &*self.history;

        // Offsets are resolved against everything published so far, so wait
        // for the fan-out thread to deliver it into the history first.
        let published = self
            .publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |p| p.next_offset);
        let mut history = log.lock().unwrap_or_else(PoisonError::into_inner);
        while (history.len() as i64) < published {
            if ctx.is_done() {
                return Err(PubSubError::ContextDone);
            }
            history = changed
                .wait_timeout(history, self.poll_interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(history);

        subscribe_loop(
            ctx,
            self.poll_interval,
            log,
            changed,
            &self.key,
            |log: &Log<T>| Some(log),
            from_offset,
            f,
        )
    }
}

impl<T> Drop for PubSubChan<T> {
    fn drop(&mut self) {
        // Dropping the sender ends the fan-out loop.
        self.publisher.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = worker.join();
        }
    }
}

/// Keyed fabric with one [`PubSubChan`] per key.
pub struct PubSubMulti<T> {
    chans: Mutex<HashMap<String, Arc<PubSubChan<T>>>>,
    capacity: usize,
    poll_interval: Duration,
}

impl<T: Envelope> Default for PubSubMulti<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl<T: Envelope> PubSubMulti<T> {
    /// `capacity` bounds each key's in-flight channel.
    pub fn new(capacity: usize) -> Self {
        Self::with_poll_interval(capacity, Duration::from_millis(10))
    }

    pub fn with_poll_interval(capacity: usize, poll_interval: Duration) -> Self {
        Self {
            chans: Mutex::new(HashMap::new()),
            capacity,
            poll_interval,
        }
    }

    fn chan(&self, key: &str) -> Result<Arc<PubSubChan<T>>, PubSubError> {
        self.chans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| PubSubError::NoPublisher(key.to_string()))
    }
}

impl<T: Envelope> PubSubApi<T> for PubSubMulti<T> {
    fn register(&self, key: &str) -> Result<(), PubSubError> {
        let mut chans = self.chans.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(chan) = chans.get(key) {
            if chan.is_finished() {
                return Err(PubSubError::Finished(key.to_string()));
            }
            return Ok(());
        }
        let chan = PubSubChan::new(key, self.capacity, self.poll_interval)?;
        chans.insert(key.to_string(), Arc::new(chan));
        tracing::trace!(key, capacity = self.capacity, "registered channel");
        Ok(())
    }

    fn publish(&self, ctx: &Context, key: &str, msg: T) -> Result<(), PubSubError> {
        if msg.offset() != 0 {
            return Err(PubSubError::PublishWithOffset(msg.offset()));
        }
        self.chan(key)?.publish(ctx, msg)
    }

    fn finish(&self, ctx: &Context, key: &str) -> Result<(), PubSubError> {
        self.chan(key)?.finish(ctx)
    }

    fn subscribe(
        &self,
        ctx: &Context,
        key: &str,
        from_offset: i64,
        f: &mut dyn FnMut(T) -> anyhow::Result<()>,
    ) -> Result<(), PubSubError> {
        self.chan(key)?.subscribe(ctx, from_offset, f)
    }

    fn wait_ready(&self) {
        let chans: Vec<Arc<PubSubChan<T>>> = self
            .chans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for chan in chans {
            chan.wait_ready();
        }
    }
}
