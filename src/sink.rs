//! Terminal sink writing aggregates to a keyed repository.
//!
//! [`RepositorySink`] is a [`Handler`] that consumes items and emits none.
//! Aggregations become saves, retractions become a save of the corrected
//! aggregate (or a delete when the corrected aggregate is null). Writes are
//! buffered per storage key, last write wins, and flushed when the batch
//! reaches `batch_size` entries or, from a background timer, once
//! `flush_interval` elapsed since the last flush. Dropping the sink writes
//! the tail; [`RepositorySink::flush`] does it explicitly.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use windflow::handler::Handler;
//! use windflow::sink::{InMemoryRepository, Repository, RepositorySink};
//! use windflow::{Item, Value};
//!
//! let repo = Arc::new(InMemoryRepository::new());
//! let sink = RepositorySink::new(repo.clone(), 100, Duration::from_secs(60));
//! sink.process(Item::new("total", 42), &mut |_| {})?;
//! assert_eq!(repo.len(), 0);
//! sink.flush()?;
//! assert_eq!(repo.get("total")?, Some(Value::from(42)));
//! # anyhow::Result::<()>::Ok(())
//! ```

use crate::handler::Handler;
use crate::value::{AGGREGATE, Value};
use crate::window::Item;
use anyhow::{Result, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A keyed store the sink writes to.
pub trait Repository: Send + Sync {
    fn save_batch(&self, entries: &[(String, Value)]) -> Result<()>;

    fn delete_batch(&self, keys: &[String]) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<Value>>;
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Repository for InMemoryRepository {
    fn save_batch(&self, entries: &[(String, Value)]) -> Result<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (k, v) in entries {
            map.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    fn delete_batch(&self, keys: &[String]) -> Result<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for k in keys {
            map.remove(k);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

struct Pending {
    // None = delete
    writes: BTreeMap<String, Option<Value>>,
    last_flush: Instant,
}

struct Shared {
    repository: Arc<dyn Repository>,
    pending: Mutex<Pending>,
    // first timed-flush error, returned by the next write or flush
    failed: Mutex<Option<anyhow::Error>>,
}

impl Shared {
    fn flush_locked(&self, pending: &mut Pending) -> Result<()> {
        pending.last_flush = Instant::now();
        if pending.writes.is_empty() {
            return Ok(());
        }
        let mut saves = Vec::new();
        let mut deletes = Vec::new();
        for (k, v) in std::mem::take(&mut pending.writes) {
            match v {
                Some(v) => saves.push((k, v)),
                None => deletes.push(k),
            }
        }
        tracing::debug!(saves = saves.len(), deletes = deletes.len(), "flushing repository sink");
        if !saves.is_empty() {
            self.repository.save_batch(&saves)?;
        }
        if !deletes.is_empty() {
            self.repository.delete_batch(&deletes)?;
        }
        Ok(())
    }

    fn take_failure(&self) -> Result<()> {
        match self.failed.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(e) => Err(e.context("timed repository flush failed")),
            None => Ok(()),
        }
    }

    /// Flusher thread body: write the batch whenever `interval` passed without a flush.
    fn run_flusher(&self, interval: Duration, stop: Receiver<()>) {
        loop {
            match stop.recv_timeout(interval.max(MIN_FLUSH_WAIT)) {
                Err(RecvTimeoutError::Timeout) => {
                    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
                    if pending.writes.is_empty() || pending.last_flush.elapsed() < interval {
                        continue;
                    }
                    if let Err(e) = self.flush_locked(&mut pending) {
                        tracing::warn!(error = %format!("{e:#}"), "timed repository flush failed");
                        self.failed
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get_or_insert(e);
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

const MIN_FLUSH_WAIT: Duration = Duration::from_millis(1);

/// Batching [`Handler`] over a [`Repository`].
///
/// A background thread writes the batch once `flush_interval` passed since
/// the last flush, so a quiet stream does not keep its tail buffered.
pub struct RepositorySink {
    shared: Arc<Shared>,
    batch_size: usize,
    flush_interval: Duration,
    stop: Option<Sender<()>>,
    flusher: Option<JoinHandle<()>>,
}

impl RepositorySink {
    pub fn new(repository: Arc<dyn Repository>, batch_size: usize, flush_interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            repository,
            pending: Mutex::new(Pending {
                writes: BTreeMap::new(),
                last_flush: Instant::now(),
            }),
            failed: Mutex::new(None),
        });

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let flusher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("repository-flusher".to_string())
                .spawn(move || shared.run_flusher(flush_interval, stop_rx))
        };
        let (stop, flusher) = match flusher {
            Ok(handle) => (Some(stop_tx), Some(handle)),
            Err(e) => {
                tracing::warn!(error = %e, "no flusher thread, interval is checked on write only");
                (None, None)
            }
        };

        Self {
            shared,
            batch_size: batch_size.max(1),
            flush_interval,
            stop,
            flusher,
        }
    }

    /// Storage key: the keyed window when the item has one, else the item key.
    pub fn storage_key(item: &Item) -> String {
        item.keyed_window().map_or_else(|| item.key.clone(), |kw| kw.to_key())
    }

    /// Number of buffered writes.
    pub fn pending(&self) -> usize {
        self.shared
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writes
            .len()
    }

    /// Write everything buffered.
    pub fn flush(&self) -> Result<()> {
        self.shared.take_failure()?;
        let mut pending = self.shared.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.shared.flush_locked(&mut pending)
    }

    fn write(&self, key: String, value: Option<Value>) -> Result<()> {
        self.shared.take_failure()?;
        let mut pending = self.shared.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.writes.insert(key, value);
        if pending.writes.len() >= self.batch_size || pending.last_flush.elapsed() >= self.flush_interval {
            self.shared.flush_locked(&mut pending)?;
        }
        Ok(())
    }
}

impl Handler for RepositorySink {
    fn process(&self, item: Item, _emit: &mut dyn FnMut(Item)) -> Result<()> {
        let key = Self::storage_key(&item);
        self.write(key, Some(item.data))
    }

    fn retract(&self, item: Item, _emit: &mut dyn FnMut(Item)) -> Result<()> {
        let key = Self::storage_key(&item);
        let Some(aggregate) = item.data.get(AGGREGATE) else {
            bail!("retraction for {key:?} carries no aggregate");
        };
        let value = (!aggregate.is_null()).then(|| aggregate.clone());
        self.write(key, value)
    }
}

impl Drop for RepositorySink {
    fn drop(&mut self) {
        // Dropping the sender stops the flusher.
        self.stop.take();
        if let Some(flusher) = self.flusher.take() {
            if flusher.join().is_err() {
                tracing::warn!("repository flusher panicked");
            }
        }
        if let Err(e) = self.flush() {
            tracing::warn!(error = %format!("{e:#}"), "repository sink lost writes on drop");
        }
    }
}
