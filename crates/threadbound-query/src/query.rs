// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-client command/result state machine.
//!
//! A [`QueryHandle`] stages a statement and its bindings, submits it to the
//! worker of its resource and keeps the published result behind one mutex.
//!
//! Every submission gets a new sequence number. A newer submission overwrites
//! an older one: an older run that has not started is dropped, and one that
//! is already running still finishes but discards its result when it sees
//! that the sequence number moved on. Completion events are emitted only for
//! results that were actually published by an asynchronous submission.
//!
//! Synchronous execution takes priority. While `exec` is in progress on a
//! handle, `exec_async` on the same handle is deferred and submitted as soon
//! as `exec` returns. Concurrent `exec` calls on one handle run one at a time.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use threadbound_core::{Command, Direction, QueryError, Record, Value};
use threadbound_worker::{panic_message, with_resource, ResourceHandle};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::command::StagedCommand;
use crate::events::{EventHub, ListenerId, QueryEvent};
use crate::result::ResultState;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Client handle for executing statements against one resource.
///
/// Cloning yields another reference to the same handle state.
#[derive(Clone)]
pub struct QueryHandle {
    inner: Arc<QueryInner>,
}

struct QueryInner {
    id: u64,
    resource: ResourceHandle,
    state: Mutex<QueryState>,
    /// Held for the duration of a synchronous `exec`.
    sync_gate: Mutex<()>,
    events: EventHub<QueryEvent>,
}

#[derive(Default)]
struct QueryState {
    staged: StagedCommand,
    /// Submitted but not yet started.
    next: Option<Command>,
    /// Submitted asynchronously while a synchronous call was in progress.
    deferred: Option<Command>,
    sequence: u64,
    /// Sequence number of the command currently executing.
    running: Option<u64>,
    /// Sequence number whose outcome is in `result`.
    published: Option<u64>,
    sync_active: bool,
    busy_reported: bool,
    result: ResultState,
}

impl QueryState {
    fn is_busy(&self) -> bool {
        self.next.is_some() || self.running.is_some() || self.deferred.is_some()
    }

    /// Busy state to announce, if it changed since the last announcement.
    fn busy_transition(&mut self) -> Option<bool> {
        let busy = self.is_busy();
        (busy != self.busy_reported).then(|| {
            self.busy_reported = busy;
            busy
        })
    }

    fn cancel_pending(&mut self) {
        if let Some(cancelled) = self.next.take() {
            debug!(sequence = cancelled.sequence, "pending submission cancelled");
        }
    }
}

impl QueryHandle {
    /// A handle with nothing staged.
    pub fn new(resource: ResourceHandle) -> Self {
        Self {
            inner: Arc::new(QueryInner {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                resource,
                state: Mutex::new(QueryState::default()),
                sync_gate: Mutex::new(()),
                events: EventHub::new(),
            }),
        }
    }

    /// A handle with `statement` already prepared.
    pub fn with_statement(resource: ResourceHandle, statement: impl Into<String>) -> Self {
        let handle = Self::new(resource);
        handle.prepare(statement);
        handle
    }

    /// Process-unique identifier of this handle.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn resource(&self) -> &ResourceHandle {
        &self.inner.resource
    }

    /// The prepared statement text.
    pub fn statement(&self) -> String {
        self.lock().staged.statement().to_string()
    }

    /// Current submission sequence number.
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    // ---- staging ------------------------------------------------------

    /// Replace the staged statement and drop all bindings. A submission that
    /// has not started yet is cancelled.
    pub fn prepare(&self, statement: impl Into<String>) {
        let mut state = self.lock();
        state.staged.prepare(statement.into());
        state.cancel_pending();
    }

    /// Append a positional binding.
    pub fn bind_positional(&self, value: impl Into<Value>, direction: Direction) {
        let mut state = self.lock();
        state.staged.bind_positional(value.into(), direction);
        state.cancel_pending();
    }

    /// Positional input binding; shorthand for the common case.
    pub fn add_bind_value(&self, value: impl Into<Value>) {
        self.bind_positional(value, Direction::In);
    }

    /// Bind a named placeholder (`name` and `:name` are equivalent).
    pub fn bind_named(&self, placeholder: &str, value: impl Into<Value>, direction: Direction) {
        let mut state = self.lock();
        state.staged.bind_named(placeholder, value.into(), direction);
        state.cancel_pending();
    }

    pub fn clear_bindings(&self) {
        let mut state = self.lock();
        state.staged.clear_bindings();
        state.cancel_pending();
    }

    pub fn bound_value(&self, index: usize) -> Option<Value> {
        self.lock().staged.positional_value(index).cloned()
    }

    pub fn bound_named_value(&self, placeholder: &str) -> Option<Value> {
        self.lock().staged.named_value(placeholder).cloned()
    }

    // ---- execution ----------------------------------------------------

    /// Submit the staged command and return immediately.
    ///
    /// The result state is cleared at once. Completion is announced with
    /// [`QueryEvent::ResultsReady`] unless a later submission overwrites this
    /// one first.
    pub fn exec_async(&self) -> Result<(), QueryError> {
        self.submit_async(false)
    }

    /// Asynchronous batch execution: one row per element of the `List`
    /// bindings.
    pub fn exec_batch_async(&self) -> Result<(), QueryError> {
        self.submit_async(true)
    }

    /// Prepare `sql` and submit it asynchronously.
    pub fn exec_sql_async(&self, sql: impl Into<String>) -> Result<(), QueryError> {
        self.prepare(sql);
        self.exec_async()
    }

    /// Execute the staged command and wait for it. No completion event is
    /// emitted. Returns whether the execution succeeded; see
    /// [`QueryHandle::last_error`] otherwise.
    pub fn exec(&self) -> bool {
        self.submit_sync(false)
    }

    pub fn exec_batch(&self) -> bool {
        self.submit_sync(true)
    }

    /// Prepare `sql` and execute it synchronously.
    pub fn exec_sql(&self, sql: impl Into<String>) -> bool {
        self.prepare(sql);
        self.exec()
    }

    fn submit_async(&self, batch: bool) -> Result<(), QueryError> {
        let (sequence, busy) = {
            let mut state = self.lock();
            if state.sync_active {
                let command = state.staged.snapshot(0, batch);
                if state.deferred.replace(command).is_some() {
                    debug!("replacing deferred submission");
                }
                (None, state.busy_transition())
            } else {
                state.sequence += 1;
                let sequence = state.sequence;
                let command = state.staged.snapshot(sequence, batch);
                state.next = Some(command);
                state.result.clear();
                state.published = None;
                (Some(sequence), state.busy_transition())
            }
        };
        if let Some(busy) = busy {
            self.inner.events.emit(QueryEvent::BusyChanged { busy });
        }
        let Some(sequence) = sequence else {
            debug!(resource = self.inner.resource.name(), "submission deferred behind synchronous exec");
            return Ok(());
        };
        debug!(resource = self.inner.resource.name(), sequence, "submitted");
        self.schedule(sequence)
    }

    fn submit_sync(&self, batch: bool) -> bool {
        let bridge = self.inner.resource.bridge();
        let _gate = if bridge.is_worker_thread() {
            // Blocking here could wait on a caller that waits on this thread.
            match self.inner.sync_gate.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    warn!(
                        resource = self.inner.resource.name(),
                        "synchronous exec re-entered on the worker thread"
                    );
                    return false;
                }
            }
        } else {
            self.inner
                .sync_gate
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        };

        let sequence = {
            let mut state = self.lock();
            state.sync_active = true;
            state.sequence += 1;
            let sequence = state.sequence;
            let command = state.staged.snapshot(sequence, batch);
            state.next = Some(command);
            state.result.clear();
            state.published = None;
            sequence
        };
        debug!(resource = self.inner.resource.name(), sequence, "executing synchronously");

        let inner = Arc::clone(&self.inner);
        let ran = bridge.call(move || inner.run_staged());

        let (success, promoted) = {
            let mut state = self.lock();
            if let Err(err) = ran {
                if state.next.as_ref().is_some_and(|c| c.sequence == sequence) {
                    state.next = None;
                }
                state.result.fail(err.into());
                state.published = Some(sequence);
            }
            state.sync_active = false;
            let success =
                state.published == Some(sequence) && state.result.last_error().is_none();

            let promoted = state.deferred.take().map(|mut command| {
                state.sequence += 1;
                command.sequence = state.sequence;
                state.next = Some(command);
                state.sequence
            });
            (success, promoted)
        };

        if let Some(sequence) = promoted {
            debug!(resource = self.inner.resource.name(), sequence, "deferred submission released");
            // Failure is recorded in the result state.
            let _ = self.schedule(sequence);
        }
        success
    }

    /// Queue `run_staged` for the command with `sequence`.
    fn schedule(&self, sequence: u64) -> Result<(), QueryError> {
        let inner = Arc::clone(&self.inner);
        match self.inner.resource.bridge().post(move || inner.run_staged()) {
            Ok(()) => Ok(()),
            Err(err) => {
                let error = QueryError::from(err);
                let mut state = self.lock();
                if state.next.as_ref().is_some_and(|c| c.sequence == sequence) {
                    state.next = None;
                    state.result.fail(error.clone());
                    state.published = Some(sequence);
                }
                Err(error)
            }
        }
    }

    // ---- results ------------------------------------------------------

    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }

    pub fn next(&self) -> bool {
        self.lock().result.next()
    }

    pub fn previous(&self) -> bool {
        self.lock().result.previous()
    }

    pub fn first(&self) -> bool {
        self.lock().result.first()
    }

    pub fn last(&self) -> bool {
        self.lock().result.last()
    }

    /// Move to absolute record `index`.
    pub fn seek(&self, index: isize) -> bool {
        self.lock().result.seek(index)
    }

    pub fn seek_relative(&self, offset: isize) -> bool {
        self.lock().result.seek_relative(offset)
    }

    /// Cursor position, when on a record.
    pub fn at(&self) -> Option<usize> {
        self.lock().result.at()
    }

    pub fn is_valid(&self) -> bool {
        self.lock().result.is_valid()
    }

    /// Number of records in the current result.
    pub fn size(&self) -> usize {
        self.lock().result.size()
    }

    pub fn record(&self) -> Option<Record> {
        self.lock().result.record().cloned()
    }

    pub fn value(&self, index: usize) -> Option<Value> {
        self.lock().result.value(index).cloned()
    }

    pub fn value_by_name(&self, name: &str) -> Option<Value> {
        self.lock().result.value_by_name(name).cloned()
    }

    /// All records of the current result.
    pub fn records(&self) -> Vec<Record> {
        self.lock().result.records().to_vec()
    }

    pub fn last_error(&self) -> Option<QueryError> {
        self.lock().result.last_error().cloned()
    }

    pub fn last_insert_id(&self) -> Option<Value> {
        self.lock().result.last_insert_id().cloned()
    }

    pub fn rows_affected(&self) -> u64 {
        self.lock().result.rows_affected()
    }

    /// A consistent copy of the whole result state.
    pub fn result(&self) -> ResultState {
        self.lock().result.clone()
    }

    /// The result published by submission `sequence`, if it is still the
    /// current one and no synchronous call is in progress.
    ///
    /// A [`QueryEvent::ResultsReady`] handler uses this to read the result
    /// it was told about; `None` means a newer submission superseded it.
    pub fn result_for(&self, sequence: u64) -> Option<ResultState> {
        let state = self.lock();
        (state.sequence == sequence && state.published == Some(sequence) && !state.sync_active)
            .then(|| state.result.clone())
    }

    // ---- events -------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.inner.events.subscribe()
    }

    /// Register a callback run on the thread that emits each event.
    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QueryEvent) + Send + Sync + 'static,
    {
        self.inner.events.connect(listener)
    }

    pub fn disconnect(&self, id: ListenerId) -> bool {
        self.inner.events.disconnect(id)
    }

    fn lock(&self) -> MutexGuard<'_, QueryState> {
        self.inner.lock()
    }
}

impl QueryInner {
    fn lock(&self) -> MutexGuard<'_, QueryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute the ready command, if any. Runs on the worker thread.
    fn run_staged(&self) {
        let resource = self.resource.name();
        let (command, busy) = {
            let mut state = self.lock();
            let command = state.next.take();
            if let Some(command) = &command {
                state.running = Some(command.sequence);
            }
            (command, state.busy_transition())
        };
        if let Some(busy) = busy {
            self.events.emit(QueryEvent::BusyChanged { busy });
        }
        let Some(command) = command else {
            return;
        };

        debug!(resource, sequence = command.sequence, statement = %command.statement, "executing");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            with_resource(|ctx| ctx.execute(&command))
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref()).to_string();
            error!(resource, sequence = command.sequence, panic = %message, "driver panicked");
            Ok(Err(QueryError::ExecutionFailed {
                message: format!("driver panicked: {message}"),
                code: None,
            }))
        })
        .unwrap_or_else(|err| Err(QueryError::from(err)));

        let (delivery, busy) = {
            let mut state = self.lock();
            state.running = None;
            let delivery = if state.next.is_some() || command.sequence != state.sequence {
                debug!(
                    resource,
                    sequence = command.sequence,
                    current = state.sequence,
                    "discarding stale result"
                );
                None
            } else {
                match outcome {
                    Ok(set) => state.result.publish(set),
                    Err(err) => {
                        debug!(resource, sequence = command.sequence, error = %err, "execution failed");
                        state.result.fail(err);
                    }
                }
                state.published = Some(command.sequence);
                let success = state.result.last_error().is_none();
                (!state.sync_active).then_some((command.sequence, success))
            };
            (delivery, state.busy_transition())
        };

        if let Some((sequence, success)) = delivery {
            self.events.emit(QueryEvent::ResultsReady { sequence, success });
        }
        if let Some(busy) = busy {
            self.events.emit(QueryEvent::BusyChanged { busy });
        }
    }
}

impl std::fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("QueryHandle")
            .field("id", &self.inner.id)
            .field("resource", &self.inner.resource.name())
            .field("statement", &state.staged.statement())
            .field("sequence", &state.sequence)
            .field("busy", &state.is_busy())
            .finish()
    }
}
