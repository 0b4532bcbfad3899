// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-thread call bridge.
//!
//! A [`Bridge`] is the sending half of a worker's task queue. `post` appends a
//! task and returns; `call` appends a task and blocks until the worker has run
//! it, unless the caller already is the worker thread, in which case the
//! closure runs in place. Queue order is FIFO.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use strum::Display;
use threadbound_core::ThreadboundError;
use tokio::sync::{mpsc, oneshot};

/// A unit of work executed on the worker thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// How [`Bridge::submit`] hands a task to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SubmitMode {
    /// Queue and return immediately.
    Async,
    /// Run in place on the worker thread, otherwise queue and wait.
    BlockingIfRemote,
}

type Outcome<R> = Result<R, Box<dyn Any + Send + 'static>>;

/// Handle for submitting tasks to one worker thread. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    resource: Arc<str>,
    thread_id: ThreadId,
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<Task>>>>,
}

impl Bridge {
    pub(crate) fn new(
        resource: &str,
        thread_id: ThreadId,
        sender: mpsc::UnboundedSender<Task>,
    ) -> Self {
        Self {
            resource: Arc::from(resource),
            thread_id,
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Name of the resource whose worker this bridge feeds.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Id of the worker thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the current thread is the worker thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Whether the queue still accepts tasks.
    pub fn is_open(&self) -> bool {
        self.lock_sender()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Queue `f` and return without waiting.
    ///
    /// Fails with `WorkerUnavailable` once the worker is draining or gone.
    pub fn post<F>(&self, f: F) -> Result<(), ThreadboundError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.lock_sender();
        let Some(sender) = guard.as_ref() else {
            return Err(self.unavailable());
        };
        sender.send(Box::new(f)).map_err(|_| self.unavailable())
    }

    /// Run `f` on the worker thread and return its result.
    ///
    /// Blocks the calling thread; must not be used from inside an async
    /// runtime (see [`Bridge::call_async`]). A panic inside `f` is resumed on
    /// the calling thread. If the worker stops before running `f` the call
    /// fails with `WorkerUnavailable`.
    pub fn call<F, R>(&self, f: F) -> Result<R, ThreadboundError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_worker_thread() {
            return Ok(f());
        }
        let rx = self.post_with_reply(f)?;
        match rx.blocking_recv() {
            Ok(outcome) => Ok(Self::unwrap_outcome(outcome)),
            Err(_) => Err(self.unavailable()),
        }
    }

    /// Like [`Bridge::call`] but awaits completion instead of blocking.
    pub async fn call_async<F, R>(&self, f: F) -> Result<R, ThreadboundError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_worker_thread() {
            return Ok(f());
        }
        let rx = self.post_with_reply(f)?;
        match rx.await {
            Ok(outcome) => Ok(Self::unwrap_outcome(outcome)),
            Err(_) => Err(self.unavailable()),
        }
    }

    /// Submit a task using the given mode.
    pub fn submit(&self, task: Task, mode: SubmitMode) -> Result<(), ThreadboundError> {
        match mode {
            SubmitMode::Async => self.post(task),
            SubmitMode::BlockingIfRemote => self.call(task),
        }
    }

    /// Stop accepting tasks. Already queued tasks still run.
    pub(crate) fn close(&self) {
        self.lock_sender().take();
    }

    fn post_with_reply<F, R>(&self, f: F) -> Result<oneshot::Receiver<Outcome<R>>, ThreadboundError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f));
            let _ = tx.send(outcome);
        })?;
        Ok(rx)
    }

    fn unwrap_outcome<R>(outcome: Outcome<R>) -> R {
        match outcome {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn lock_sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Task>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unavailable(&self) -> ThreadboundError {
        ThreadboundError::WorkerUnavailable {
            resource: self.resource.to_string(),
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("resource", &self.resource)
            .field("thread_id", &self.thread_id)
            .field("open", &self.is_open())
            .finish()
    }
}
