use super::TriggerDescription;
use crate::context::Context;
use anyhow::{Result, anyhow};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shortest interval a ticker thread sleeps between ticks.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Callback invoked on every tick with the ticking period.
pub type TickFn = Arc<dyn Fn(Duration) -> Result<()> + Send + Sync>;

/// One periodic ticker thread per distinct `AtPeriod` duration.
///
/// Durations are reference counted: registering a description walks its
/// whole tree, so `AnyOf`/`AllOf` register their children transitively.
/// A tick callback error stops that ticker and is reported by [`Tickers::stop`].
#[derive(Default)]
pub struct Tickers {
    periods: BTreeMap<Duration, usize>,
    running: Vec<(Sender<()>, JoinHandle<()>)>,
    error: Arc<Mutex<Option<anyhow::Error>>>,
}

impl Tickers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, description: &TriggerDescription) {
        for period in description.periods() {
            *self.periods.entry(period).or_insert(0) += 1;
        }
    }

    pub fn unregister(&mut self, description: &TriggerDescription) {
        for period in description.periods() {
            if let Some(count) = self.periods.get_mut(&period) {
                *count -= 1;
                if *count == 0 {
                    self.periods.remove(&period);
                }
            }
        }
    }

    /// Registered periods, shortest first.
    pub fn periods(&self) -> Vec<Duration> {
        self.periods.keys().copied().collect()
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// Spawn one thread per registered period. Threads exit on [`stop`](Self::stop)
    /// or once `ctx` is done. Periods shorter than [`MIN_TICK_INTERVAL`] tick at
    /// that interval but still report their own period.
    pub fn start(&mut self, ctx: &Context, on_tick: TickFn) -> Result<()> {
        for period in self.periods() {
            let (stop_tx, stop_rx) = bounded::<()>(1);
            let interval = period.max(MIN_TICK_INTERVAL);
            let ctx = ctx.clone();
            let on_tick = Arc::clone(&on_tick);
            let error = Arc::clone(&self.error);
            let handle = thread::Builder::new()
                .name(format!("ticker-{}ms", period.as_millis()))
                .spawn(move || {
                    loop {
                        match stop_rx.recv_timeout(interval) {
                            Err(RecvTimeoutError::Timeout) => {
                                if ctx.is_done() {
                                    break;
                                }
                                if let Err(e) = on_tick(period) {
                                    tracing::warn!(?period, error = %e, "ticker stopped");
                                    error
                                        .lock()
                                        .unwrap_or_else(PoisonError::into_inner)
                                        .get_or_insert(e);
                                    break;
                                }
                            }
                            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                })
                .map_err(|e| anyhow!("spawning ticker thread: {e}"))?;
            self.running.push((stop_tx, handle));
        }
        Ok(())
    }

    /// Stop and join all ticker threads, returning the first tick error.
    pub fn stop(&mut self) -> Result<()> {
        for (stop_tx, _) in &self.running {
            let _ = stop_tx.send(());
        }
        let panicked = self
            .running
            .drain(..)
            .map(|(_, handle)| handle.join())
            .filter(Result::is_err)
            .count();
        if let Some(e) = self.error.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(e);
        }
        if panicked > 0 {
            return Err(anyhow!("{panicked} ticker thread(s) panicked"));
        }
        Ok(())
    }
}

impl Drop for Tickers {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
