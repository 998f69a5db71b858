//! A group of named tasks sharing one cancellation context.
//!
//! Each task runs on its own OS thread. The first task to fail, or panic,
//! records its error and cancels the group's context so that siblings
//! blocked in the pub/sub fabric return promptly. [`ExecutionGroup::wait`]
//! joins everything and returns that first error.

use crate::context::Context;
use anyhow::{Result, anyhow};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

pub struct ExecutionGroup {
    ctx: Context,
    tasks: Vec<(String, JoinHandle<()>)>,
    first_error: Arc<Mutex<Option<anyhow::Error>>>,
}

impl ExecutionGroup {
    /// A group whose context is a cancellable child of `parent`.
    pub fn new(parent: &Context) -> Self {
        Self {
            ctx: parent.with_cancel(),
            tasks: Vec::new(),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn `task` on a thread named `name`; it receives the group context.
    pub fn go<F>(&mut self, name: impl Into<String>, task: F) -> Result<()>
    where
        F: FnOnce(Context) -> Result<()> + Send + 'static,
    {
        let name = name.into();
        let ctx = self.ctx.clone();
        let first_error = Arc::clone(&self.first_error);
        let task_name = name.clone();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(ctx.clone())))
                .unwrap_or_else(|payload| Err(anyhow!("task panicked: {}", panic_message(&*payload))));
            if let Err(e) = outcome {
                tracing::warn!(task = %task_name, error = %format!("{e:#}"), "task failed, cancelling group");
                first_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert(e.context(format!("task {task_name}")));
                ctx.cancel();
            }
        })?;
        self.tasks.push((name, handle));
        Ok(())
    }

    /// Cancel every task of the group.
    pub fn cancel(&self) {
        self.ctx.cancel();
    }

    /// Join all tasks, returning the first error any of them produced.
    pub fn wait(self) -> Result<()> {
        for (name, handle) in self.tasks {
            if handle.join().is_err() {
                self.first_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert_with(|| anyhow!("task {name} could not be joined"));
            }
        }
        match self.first_error.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
