// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The affinity worker: one OS thread that exclusively owns one resource.
//!
//! Lifecycle: `Starting -> Running -> Draining -> Stopped`. Shutdown stops
//! the queue from accepting tasks, lets queued tasks finish, closes the
//! connection and joins the thread. A panic escaping a posted task stops the
//! worker at once; queued tasks are dropped so blocked callers are released
//! with `WorkerUnavailable`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use strum::Display;
use threadbound_core::{ConnectParams, Driver, ThreadboundError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bridge::{Bridge, SubmitMode, Task};
use crate::context::{self, ResourceContext};

/// Lifecycle state of an [`AffinityWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum WorkerState {
    Starting,
    Running,
    Draining,
    Stopped,
}

/// A dedicated thread owning one resource connection.
pub struct AffinityWorker {
    resource: String,
    bridge: Bridge,
    state: Arc<Mutex<WorkerState>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

fn lock_state(state: &Mutex<WorkerState>) -> MutexGuard<'_, WorkerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AffinityWorker {
    /// Spawn a worker thread named `<prefix>-<resource>`.
    ///
    /// The connection is not opened here; `open` runs later as a task on the
    /// new thread.
    pub fn spawn(
        resource: &str,
        driver: Arc<dyn Driver>,
        params: ConnectParams,
        thread_name_prefix: &str,
    ) -> Result<Self, ThreadboundError> {
        let (tx, rx) = mpsc::unbounded_channel::<Task>();
        let state = Arc::new(Mutex::new(WorkerState::Starting));

        let thread_state = Arc::clone(&state);
        let owned_name = resource.to_string();
        let handle = thread::Builder::new()
            .name(format!("{thread_name_prefix}-{resource}"))
            .spawn(move || {
                // Connections are not `Send`; the context is built on the thread that owns it.
                let context = ResourceContext::new(&owned_name, driver, params);
                run(context, rx, thread_state)
            })
            .map_err(|e| {
                ThreadboundError::Internal(format!("failed to spawn worker for `{resource}`: {e}"))
            })?;

        let bridge = Bridge::new(resource, handle.thread().id(), tx);
        debug!(resource, thread = ?handle.thread().name(), "affinity worker spawned");

        Ok(Self {
            resource: resource.to_string(),
            bridge,
            state,
            join: Mutex::new(Some(handle)),
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn thread_id(&self) -> ThreadId {
        self.bridge.thread_id()
    }

    pub fn state(&self) -> WorkerState {
        *lock_state(&self.state)
    }

    /// Queue `f` without waiting. See [`Bridge::post`].
    pub fn post<F>(&self, f: F) -> Result<(), ThreadboundError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.bridge.post(f)
    }

    /// Run `f` on the worker and wait for its result. See [`Bridge::call`].
    pub fn call<F, R>(&self, f: F) -> Result<R, ThreadboundError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.bridge.call(f)
    }

    pub fn submit(&self, task: Task, mode: SubmitMode) -> Result<(), ThreadboundError> {
        self.bridge.submit(task, mode)
    }

    /// Drain and stop the worker, blocking until its thread has exited.
    ///
    /// Idempotent. Fails when called from the worker's own thread, which
    /// would otherwise wait on itself.
    pub fn shutdown(&self) -> Result<(), ThreadboundError> {
        if self.bridge.is_worker_thread() {
            return Err(ThreadboundError::Internal(format!(
                "worker for `{}` cannot shut itself down",
                self.resource
            )));
        }

        let mut join = self.join.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut state = lock_state(&self.state);
            if *state != WorkerState::Stopped {
                *state = WorkerState::Draining;
            }
        }
        self.bridge.close();

        if let Some(handle) = join.take() {
            if handle.join().is_err() {
                warn!(resource = %self.resource, "worker thread panicked during teardown");
            }
            info!(resource = %self.resource, "affinity worker shut down");
        }
        Ok(())
    }
}

impl Drop for AffinityWorker {
    fn drop(&mut self) {
        if self.bridge.is_worker_thread() {
            // Last reference released by one of our own tasks: the loop exits
            // after the queue drains and the thread detaches.
            self.bridge.close();
        } else if let Err(err) = self.shutdown() {
            warn!(resource = %self.resource, error = %err, "worker teardown on drop failed");
        }
    }
}

impl std::fmt::Debug for AffinityWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityWorker")
            .field("resource", &self.resource)
            .field("state", &self.state())
            .field("thread_id", &self.thread_id())
            .finish()
    }
}

/// Marks the worker stopped however the thread body exits.
struct StoppedOnExit(Arc<Mutex<WorkerState>>);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        *lock_state(&self.0) = WorkerState::Stopped;
    }
}

fn run(context: ResourceContext, mut rx: mpsc::UnboundedReceiver<Task>, state: Arc<Mutex<WorkerState>>) {
    let _stopped = StoppedOnExit(Arc::clone(&state));
    let resource = context.resource().to_string();
    context::install(context);
    {
        let mut state = lock_state(&state);
        if *state == WorkerState::Starting {
            *state = WorkerState::Running;
        }
    }
    info!(%resource, "affinity worker running");

    while let Some(task) = rx.blocking_recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!(
                %resource,
                panic = panic_message(payload.as_ref()),
                "task panicked, stopping worker"
            );
            *lock_state(&state) = WorkerState::Draining;
            break;
        }
    }

    // Dropping the receiver discards anything still queued, which releases
    // blocked callers and makes later submissions fail.
    drop(rx);

    if let Some(mut context) = context::uninstall() {
        context.close();
    }
    info!(%resource, "affinity worker stopped");
}

/// Text of a panic payload, when it carries one.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
