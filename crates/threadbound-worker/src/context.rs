// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-worker resource state, reachable only from the worker thread.
//!
//! Each affinity worker installs one [`ResourceContext`] in a thread local
//! before it runs any task. The live connection never leaves that thread:
//! the only way to reach it is [`with_resource`], which fails on any other
//! thread.

use std::cell::RefCell;
use std::sync::Arc;

use threadbound_core::{
    Command, ConnectParams, Connection, Driver, DriverError, QueryError, RecordSet,
    ThreadboundError,
};
use tracing::{debug, info, warn};

thread_local! {
    static RESOURCE: RefCell<Option<ResourceContext>> = const { RefCell::new(None) };
}

/// The resource owned by the current worker thread.
pub struct ResourceContext {
    resource: String,
    driver: Arc<dyn Driver>,
    params: ConnectParams,
    connection: Option<Box<dyn Connection>>,
    last_error: Option<DriverError>,
    open_error: bool,
}

impl ResourceContext {
    pub(crate) fn new(resource: &str, driver: Arc<dyn Driver>, params: ConnectParams) -> Self {
        Self {
            resource: resource.to_string(),
            driver,
            params,
            connection: None,
            last_error: None,
            open_error: false,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Parameters used by the next `open`. An open connection is unaffected.
    pub fn params_mut(&mut self) -> &mut ConnectParams {
        &mut self.params
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the most recent `open` failed.
    pub fn is_open_error(&self) -> bool {
        self.open_error
    }

    /// The most recent driver failure, if any.
    pub fn last_error(&self) -> Option<&DriverError> {
        self.last_error.as_ref()
    }

    /// Open the connection. Opening an already open resource is a no-op.
    pub fn open(&mut self) -> Result<(), ThreadboundError> {
        if self.connection.is_some() {
            debug!(resource = %self.resource, "resource already open");
            return Ok(());
        }
        match self.driver.open(&self.params) {
            Ok(connection) => {
                self.connection = Some(connection);
                self.last_error = None;
                self.open_error = false;
                info!(
                    resource = %self.resource,
                    driver = self.driver.name(),
                    database = %self.params.database_name,
                    "resource opened"
                );
                Ok(())
            }
            Err(err) => {
                warn!(resource = %self.resource, error = %err, "failed to open resource");
                self.last_error = Some(err.clone());
                self.open_error = true;
                Err(ThreadboundError::ConnectOpenFailed {
                    resource: self.resource.clone(),
                    source: err,
                })
            }
        }
    }

    /// Close the connection if open. Close failures are logged and kept as
    /// the last error.
    pub fn close(&mut self) {
        self.open_error = false;
        let Some(connection) = self.connection.take() else {
            return;
        };
        match connection.close() {
            Ok(()) => info!(resource = %self.resource, "resource closed"),
            Err(err) => {
                warn!(resource = %self.resource, error = %err, "error while closing resource");
                self.last_error = Some(err);
            }
        }
    }

    /// Execute a command on the live connection.
    pub fn execute(&mut self, command: &Command) -> Result<RecordSet, QueryError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(QueryError::ConnectionUnavailable {
                resource: self.resource.clone(),
            });
        };
        match connection.execute(command) {
            Ok(set) => {
                self.last_error = None;
                Ok(set)
            }
            Err(err) => {
                let query_error = QueryError::execution(&err);
                self.last_error = Some(err);
                Err(query_error)
            }
        }
    }

    pub fn transaction(&mut self) -> Result<(), ThreadboundError> {
        self.control("BEGIN", |c| c.begin())
    }

    pub fn commit(&mut self) -> Result<(), ThreadboundError> {
        self.control("COMMIT", |c| c.commit())
    }

    pub fn rollback(&mut self) -> Result<(), ThreadboundError> {
        self.control("ROLLBACK", |c| c.rollback())
    }

    fn control(
        &mut self,
        what: &str,
        op: impl FnOnce(&mut dyn Connection) -> Result<(), DriverError>,
    ) -> Result<(), ThreadboundError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(ThreadboundError::ConnectionUnavailable {
                resource: self.resource.clone(),
            });
        };
        op(connection.as_mut()).map_err(|err| {
            warn!(resource = %self.resource, error = %err, "{what} failed");
            self.last_error = Some(err.clone());
            ThreadboundError::ExecutionFailed {
                resource: self.resource.clone(),
                source: err,
            }
        })
    }
}

impl std::fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceContext")
            .field("resource", &self.resource)
            .field("driver", &self.driver.name())
            .field("params", &self.params)
            .field("open", &self.is_open())
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Run `f` against the current thread's resource.
///
/// Fails with `Internal` when called off a worker thread or re-entrantly from
/// inside another `with_resource` closure.
pub fn with_resource<R>(f: impl FnOnce(&mut ResourceContext) -> R) -> Result<R, ThreadboundError> {
    RESOURCE.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| {
            ThreadboundError::Internal("resource context is already in use on this thread".into())
        })?;
        let context = slot.as_mut().ok_or_else(|| {
            ThreadboundError::Internal("not running on an affinity worker thread".into())
        })?;
        Ok(f(context))
    })
}

/// Whether the current thread is an affinity worker.
pub fn on_worker_thread() -> bool {
    RESOURCE.with(|cell| match cell.try_borrow() {
        Ok(slot) => slot.is_some(),
        // Only a worker holds a mutable borrow.
        Err(_) => true,
    })
}

pub(crate) fn install(context: ResourceContext) {
    RESOURCE.with(|cell| *cell.borrow_mut() = Some(context));
}

pub(crate) fn uninstall() -> Option<ResourceContext> {
    RESOURCE.with(|cell| cell.borrow_mut().take())
}
