// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-side handle for a registered resource.
//!
//! Every operation is forwarded to the owning worker. Getters and connection
//! control block until the worker answers; parameter setters are queued and
//! return immediately, so they apply in order with everything else queued.

use std::sync::Arc;

use threadbound_core::{ConnectParams, DriverError, ThreadboundError};
use tracing::warn;

use crate::bridge::Bridge;
use crate::context::{self, ResourceContext};
use crate::worker::AffinityWorker;

/// A cloneable reference to a named resource and its worker.
///
/// A handle stays bound to the worker it was issued for. Once that worker
/// is torn down or replaced, every operation fails with `WorkerUnavailable`.
#[derive(Clone, Debug)]
pub struct ResourceHandle {
    worker: Arc<AffinityWorker>,
}

impl ResourceHandle {
    pub(crate) fn new(worker: Arc<AffinityWorker>) -> Self {
        Self { worker }
    }

    pub fn name(&self) -> &str {
        self.worker.resource()
    }

    pub fn worker(&self) -> &Arc<AffinityWorker> {
        &self.worker
    }

    pub fn bridge(&self) -> &Bridge {
        self.worker.bridge()
    }

    /// Run `f` against the resource on its worker thread and wait.
    pub fn with_context<F, R>(&self, f: F) -> Result<R, ThreadboundError>
    where
        F: FnOnce(&mut ResourceContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.bridge().call(move || context::with_resource(f))?
    }

    /// Open the connection. Open failures are returned, not deferred.
    pub fn open(&self) -> Result<(), ThreadboundError> {
        self.with_context(|ctx| ctx.open())?
    }

    pub fn close(&self) -> Result<(), ThreadboundError> {
        self.with_context(|ctx| ctx.close())
    }

    /// Whether the connection is open. An unavailable worker reads as closed.
    pub fn is_open(&self) -> bool {
        self.with_context(|ctx| ctx.is_open()).unwrap_or(false)
    }

    pub fn is_open_error(&self) -> bool {
        self.with_context(|ctx| ctx.is_open_error())
            .unwrap_or(false)
    }

    pub fn last_error(&self) -> Option<DriverError> {
        self.with_context(|ctx| ctx.last_error().cloned())
            .ok()
            .flatten()
    }

    pub fn driver_name(&self) -> Result<String, ThreadboundError> {
        self.with_context(|ctx| ctx.driver_name().to_string())
    }

    pub fn transaction(&self) -> Result<(), ThreadboundError> {
        self.with_context(|ctx| ctx.transaction())?
    }

    pub fn commit(&self) -> Result<(), ThreadboundError> {
        self.with_context(|ctx| ctx.commit())?
    }

    pub fn rollback(&self) -> Result<(), ThreadboundError> {
        self.with_context(|ctx| ctx.rollback())?
    }

    /// Current connection parameters.
    pub fn params(&self) -> Result<ConnectParams, ThreadboundError> {
        self.with_context(|ctx| ctx.params().clone())
    }

    /// Queue a change to the connection parameters. Takes effect on the next
    /// `open`.
    pub fn update_params<F>(&self, f: F) -> Result<(), ThreadboundError>
    where
        F: FnOnce(&mut ConnectParams) + Send + 'static,
    {
        self.bridge().post(move || {
            if let Err(err) = context::with_resource(|ctx| f(ctx.params_mut())) {
                warn!(error = %err, "parameter update dropped");
            }
        })
    }

    pub fn set_database_name(&self, name: impl Into<String>) -> Result<(), ThreadboundError> {
        let name = name.into();
        self.update_params(move |p| p.database_name = name)
    }

    pub fn set_host_name(&self, host: impl Into<String>) -> Result<(), ThreadboundError> {
        let host = host.into();
        self.update_params(move |p| p.host_name = Some(host))
    }

    pub fn set_port(&self, port: u16) -> Result<(), ThreadboundError> {
        self.update_params(move |p| p.port = Some(port))
    }

    pub fn set_user_name(&self, user: impl Into<String>) -> Result<(), ThreadboundError> {
        let user = user.into();
        self.update_params(move |p| p.user_name = Some(user))
    }

    pub fn set_password(&self, password: impl Into<String>) -> Result<(), ThreadboundError> {
        let password = password.into();
        self.update_params(move |p| p.password = Some(password))
    }

    pub fn set_connect_options(&self, options: impl Into<String>) -> Result<(), ThreadboundError> {
        let options = options.into();
        self.update_params(move |p| p.options = Some(options))
    }

    pub fn database_name(&self) -> Result<String, ThreadboundError> {
        self.with_context(|ctx| ctx.params().database_name.clone())
    }

    pub fn host_name(&self) -> Result<Option<String>, ThreadboundError> {
        self.with_context(|ctx| ctx.params().host_name.clone())
    }

    pub fn port(&self) -> Result<Option<u16>, ThreadboundError> {
        self.with_context(|ctx| ctx.params().port)
    }

    pub fn user_name(&self) -> Result<Option<String>, ThreadboundError> {
        self.with_context(|ctx| ctx.params().user_name.clone())
    }

    pub fn password(&self) -> Result<Option<String>, ThreadboundError> {
        self.with_context(|ctx| ctx.params().password.clone())
    }

    pub fn connect_options(&self) -> Result<Option<String>, ThreadboundError> {
        self.with_context(|ctx| ctx.params().options.clone())
    }
}
