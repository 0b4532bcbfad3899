// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table-shaped snapshot of a query's results.
//!
//! A [`ResultModel`] runs a query and keeps a copy of the full result set for
//! row/column access. Asynchronous requests coalesce: while the current query
//! is busy only the latest request is kept, and it is issued once the
//! current one completes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use threadbound_core::{QueryError, Record, ThreadboundError, Value};
use threadbound_worker::Registry;
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::{EventHub, ListenerId, ModelEvent, QueryEvent};
use crate::query::QueryHandle;
use crate::result::ResultState;

/// What the model should run next.
enum Request {
    Statement { sql: String, resource: String },
    Prepared(QueryHandle),
}

#[derive(Clone)]
pub struct ResultModel {
    inner: Arc<ModelInner>,
}

struct ModelInner {
    registry: Arc<Registry>,
    state: Mutex<ModelState>,
    events: EventHub<ModelEvent>,
}

#[derive(Default)]
struct ModelState {
    query: Option<(QueryHandle, ListenerId)>,
    pending: Option<Request>,
    /// An issued query has not been refreshed into the rows yet.
    awaiting: bool,
    rows: Vec<Record>,
    columns: Vec<String>,
    last_error: Option<QueryError>,
}

impl ResultModel {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                registry,
                state: Mutex::new(ModelState::default()),
                events: EventHub::new(),
            }),
        }
    }

    /// Run `sql` against `resource` without blocking.
    ///
    /// If the current query is still running the request is queued, replacing
    /// any request queued earlier.
    pub fn set_query_async(&self, sql: impl Into<String>, resource: &str) -> Result<(), ThreadboundError> {
        self.inner.request(Request::Statement {
            sql: sql.into(),
            resource: resource.to_string(),
        })
    }

    /// Run an already prepared handle without blocking. Coalesces like
    /// [`ResultModel::set_query_async`].
    pub fn set_prepared_query_async(&self, query: QueryHandle) -> Result<(), ThreadboundError> {
        self.inner.request(Request::Prepared(query))
    }

    /// Run `sql` against `resource` and wait until the rows are in place.
    ///
    /// Any queued asynchronous request is dropped. Returns whether the query
    /// succeeded.
    pub fn set_query(&self, sql: impl Into<String>, resource: &str) -> Result<bool, ThreadboundError> {
        let query = QueryHandle::new(self.inner.registry.resource(resource)?);
        query.prepare(sql);
        Ok(self.inner.run_sync(query))
    }

    /// Run a prepared handle and wait until the rows are in place.
    pub fn set_prepared_query(&self, query: QueryHandle) -> bool {
        self.inner.run_sync(query)
    }

    /// The query currently backing the model.
    pub fn query(&self) -> Option<QueryHandle> {
        self.lock().query.as_ref().map(|(q, _)| q.clone())
    }

    /// Whether a request is queued or the rows do not reflect the last
    /// issued query yet.
    pub fn is_busy(&self) -> bool {
        let state = self.lock();
        state.pending.is_some()
            || state.awaiting
            || state.query.as_ref().is_some_and(|(q, _)| q.is_busy())
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.lock().columns.len()
    }

    /// Column names, taken from the first row.
    pub fn columns(&self) -> Vec<String> {
        self.lock().columns.clone()
    }

    pub fn header(&self, section: usize) -> Option<String> {
        self.lock().columns.get(section).cloned()
    }

    pub fn data(&self, row: usize, column: usize) -> Option<Value> {
        self.lock()
            .rows
            .get(row)
            .and_then(|r| r.value(column))
            .cloned()
    }

    pub fn row(&self, row: usize) -> Option<Record> {
        self.lock().rows.get(row).cloned()
    }

    pub fn rows(&self) -> Vec<Record> {
        self.lock().rows.clone()
    }

    /// Error of the last refresh, if it failed.
    pub fn last_error(&self) -> Option<QueryError> {
        self.lock().last_error.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.inner.events.subscribe()
    }

    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        self.inner.events.connect(listener)
    }

    pub fn disconnect(&self, id: ListenerId) -> bool {
        self.inner.events.disconnect(id)
    }

    fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.inner.lock()
    }
}

impl ModelInner {
    fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(self: &Arc<Self>, request: Request) -> Result<(), ThreadboundError> {
        let mut state = self.lock();
        if state.query.as_ref().is_some_and(|(q, _)| q.is_busy()) {
            if state.pending.replace(request).is_some() {
                debug!("older queued model request discarded");
            }
            return Ok(());
        }
        state.pending = None;
        self.issue(&mut state, request)
    }

    /// Attach to the request's query and submit it. Called with the state
    /// lock held; submission only queues work, so nothing here waits on a
    /// worker.
    fn issue(self: &Arc<Self>, state: &mut ModelState, request: Request) -> Result<(), ThreadboundError> {
        let query = match request {
            Request::Statement { sql, resource } => {
                QueryHandle::with_statement(self.registry.resource(&resource)?, sql)
            }
            Request::Prepared(query) => query,
        };
        self.attach(state, &query);
        state.awaiting = true;
        query.exec_async().map_err(|err| {
            state.awaiting = false;
            match err {
                QueryError::WorkerUnavailable { resource } => {
                    ThreadboundError::WorkerUnavailable { resource }
                }
                other => ThreadboundError::Internal(other.to_string()),
            }
        })
    }

    fn attach(self: &Arc<Self>, state: &mut ModelState, query: &QueryHandle) {
        if let Some((old, listener)) = state.query.take() {
            old.disconnect(listener);
        }
        let weak = Arc::downgrade(self);
        let query_id = query.id();
        let listener = query.connect(move |event| {
            if let QueryEvent::ResultsReady { sequence, .. } = event {
                ModelInner::on_results(&weak, query_id, *sequence);
            }
        });
        state.query = Some((query.clone(), listener));
    }

    fn run_sync(self: &Arc<Self>, query: QueryHandle) -> bool {
        {
            let mut state = self.lock();
            if state.pending.take().is_some() {
                debug!("queued model request dropped by synchronous query");
            }
            self.attach(&mut state, &query);
            state.awaiting = true;
        }
        // The lock is released: a completion for an earlier query may need it
        // on the worker while this call waits.
        let success = query.exec();
        self.refresh(success, &query.result());
        success
    }

    /// Completion listener; runs on the query's worker thread.
    fn on_results(weak: &Weak<Self>, query_id: u64, sequence: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let current = inner
            .lock()
            .query
            .as_ref()
            .filter(|(q, _)| q.id() == query_id)
            .map(|(q, _)| q.clone());
        let Some(query) = current else {
            return;
        };
        // The event may be delivered after the same handle was submitted
        // again; that newer submission announces its own completion.
        let Some(result) = query.result_for(sequence) else {
            debug!(sequence, current = query.sequence(), "stale completion ignored");
            return;
        };

        inner.refresh(result.last_error().is_none(), &result);

        let mut state = inner.lock();
        if let Some(request) = state.pending.take() {
            if let Err(err) = inner.issue(&mut state, request) {
                debug!(error = %err, "queued model request could not be issued");
                state.last_error = Some(err.into());
            }
        }
    }

    /// Replace the rows with a copy of `result`.
    fn refresh(&self, success: bool, result: &ResultState) {
        self.events.emit(ModelEvent::AboutToReset);

        let (rows, error) = if success {
            (result.records().to_vec(), None)
        } else {
            (Vec::new(), result.last_error().cloned())
        };
        let count = rows.len();
        {
            let mut state = self.lock();
            state.columns = rows
                .first()
                .map(|r| r.fields().iter().map(|f| f.name.clone()).collect())
                .unwrap_or_default();
            state.rows = rows;
            state.last_error = error.clone();
            state.awaiting = false;
        }

        self.events.emit(ModelEvent::Reset { rows: count });
        if let Some(error) = error {
            self.events.emit(ModelEvent::QueryFailed { error });
        }
    }
}

impl std::fmt::Debug for ResultModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResultModel")
            .field("rows", &state.rows.len())
            .field("columns", &state.columns)
            .field("pending", &state.pending.is_some())
            .finish()
    }
}
