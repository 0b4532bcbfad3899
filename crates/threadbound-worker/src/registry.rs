// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource registry mapping names to affinity workers.
//!
//! At most one worker exists per name. Re-registering a name tears the old
//! worker down (its queue drains and its connection closes) before the new
//! one is installed. Mutations are serialized and refused on worker threads,
//! where waiting for a teardown could mean waiting on oneself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use threadbound_core::{ConnectParams, Driver, ThreadboundError};
use tracing::{info, warn};

use crate::context;
use crate::resource::ResourceHandle;
use crate::worker::AffinityWorker;

/// Drivers available to [`Registry::add_resource`], keyed by type name.
#[derive(Default)]
pub struct DriverCatalog {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its own name, replacing any previous one.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    /// Registered driver type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverCatalog")
            .field("drivers", &self.names())
            .finish()
    }
}

/// Registry settings.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Worker threads are named `<prefix>-<resource>`.
    pub thread_name_prefix: String,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            thread_name_prefix: "threadbound".to_string(),
        }
    }
}

/// Process-wide map from resource name to its affinity worker.
#[derive(Debug)]
pub struct Registry {
    options: RegistryOptions,
    drivers: RwLock<DriverCatalog>,
    workers: RwLock<HashMap<String, Arc<AffinityWorker>>>,
    /// Serializes register / teardown / shutdown.
    admin: Mutex<()>,
    shut_down: AtomicBool,
}

impl Registry {
    pub fn new(options: RegistryOptions) -> Self {
        Self {
            options,
            drivers: RwLock::new(DriverCatalog::new()),
            workers: RwLock::new(HashMap::new()),
            admin: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Make a driver available to [`Registry::add_resource`].
    pub fn register_driver(&self, driver: Arc<dyn Driver>) {
        self.drivers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(driver);
    }

    pub fn driver_names(&self) -> Vec<String> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
    }

    /// Register `name` with a driver looked up by type name.
    pub fn add_resource(
        &self,
        name: &str,
        driver_type: &str,
        params: ConnectParams,
    ) -> Result<ResourceHandle, ThreadboundError> {
        let driver = self
            .drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(driver_type)
            .ok_or_else(|| ThreadboundError::UnknownDriver {
                driver: driver_type.to_string(),
            })?;
        self.register(name, driver, params)
    }

    /// Register `name`, replacing and tearing down any existing worker.
    ///
    /// Blocks until the previous worker (if any) has drained and stopped.
    pub fn register(
        &self,
        name: &str,
        driver: Arc<dyn Driver>,
        params: ConnectParams,
    ) -> Result<ResourceHandle, ThreadboundError> {
        self.ensure_mutable("register")?;
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_shut_down() {
            return Err(ThreadboundError::Internal(format!(
                "cannot register `{name}`: registry is shut down"
            )));
        }

        let previous = self.write_workers().remove(name);
        if let Some(old) = previous {
            info!(resource = name, "replacing registered resource");
            old.shutdown()?;
        }

        let driver_name = driver.name().to_string();
        let worker = Arc::new(AffinityWorker::spawn(
            name,
            driver,
            params,
            &self.options.thread_name_prefix,
        )?);
        self.write_workers()
            .insert(name.to_string(), Arc::clone(&worker));
        info!(resource = name, driver = %driver_name, "resource registered");
        Ok(ResourceHandle::new(worker))
    }

    /// The worker serving `name`.
    pub fn lookup(&self, name: &str) -> Result<Arc<AffinityWorker>, ThreadboundError> {
        self.read_workers()
            .get(name)
            .cloned()
            .ok_or_else(|| ThreadboundError::ResourceNotFound {
                name: name.to_string(),
            })
    }

    /// A handle to the resource registered as `name`.
    pub fn resource(&self, name: &str) -> Result<ResourceHandle, ThreadboundError> {
        self.lookup(name).map(ResourceHandle::new)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read_workers().contains_key(name)
    }

    /// Registered resource names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_workers().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read_workers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_workers().is_empty()
    }

    /// Remove `name` and tear its worker down.
    pub fn teardown(&self, name: &str) -> Result<(), ThreadboundError> {
        self.ensure_mutable("teardown")?;
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        let worker = self
            .write_workers()
            .remove(name)
            .ok_or_else(|| ThreadboundError::ResourceNotFound {
                name: name.to_string(),
            })?;
        worker.shutdown()?;
        info!(resource = name, "resource torn down");
        Ok(())
    }

    /// Tear down every resource. Runs once; later calls return `Ok` and later
    /// registrations fail.
    ///
    /// Every worker is attempted even if one fails; the first failure is
    /// returned.
    pub fn shutdown(&self) -> Result<(), ThreadboundError> {
        self.ensure_mutable("shutdown")?;
        let _admin = self.admin.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut workers: Vec<(String, Arc<AffinityWorker>)> =
            self.write_workers().drain().collect();
        workers.sort_by(|a, b| a.0.cmp(&b.0));

        let mut first_error = None;
        for (name, worker) in workers {
            if let Err(err) = worker.shutdown() {
                warn!(resource = %name, error = %err, "resource teardown failed");
                first_error.get_or_insert(err);
            }
        }
        info!("resource registry shut down");
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_mutable(&self, op: &str) -> Result<(), ThreadboundError> {
        if context::on_worker_thread() {
            return Err(ThreadboundError::Internal(format!(
                "registry {op} is not allowed on an affinity worker thread"
            )));
        }
        Ok(())
    }

    fn read_workers(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<AffinityWorker>>> {
        self.workers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_workers(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<AffinityWorker>>> {
        self.workers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadbound_test_utils::MockDriver;
    use tracing_test::traced_test;

    fn registry_with_mock() -> (Registry, MockDriver) {
        let registry = Registry::default();
        let driver = MockDriver::new();
        registry.register_driver(Arc::new(driver.clone()));
        (registry, driver)
    }

    #[test]
    fn catalog_lists_sorted_names() {
        let mut catalog = DriverCatalog::new();
        catalog.register(Arc::new(MockDriver::named("zeta")));
        catalog.register(Arc::new(MockDriver::named("alpha")));
        assert_eq!(catalog.names(), vec!["alpha", "zeta"]);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("alpha").is_some());
        assert!(catalog.get("beta").is_none());
    }

    #[test]
    fn add_resource_with_unknown_driver_fails() {
        let registry = Registry::default();
        let err = registry
            .add_resource("main", "oracle", ConnectParams::default())
            .unwrap_err();
        assert!(matches!(err, ThreadboundError::UnknownDriver { driver } if driver == "oracle"));
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_of_missing_resource_fails() {
        let registry = Registry::default();
        assert!(matches!(
            registry.lookup("ghost"),
            Err(ThreadboundError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            registry.teardown("ghost"),
            Err(ThreadboundError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn register_and_lookup_share_one_worker() {
        let (registry, _driver) = registry_with_mock();
        let handle = registry
            .add_resource("main", "mock", ConnectParams::default())
            .unwrap();
        let looked_up = registry.lookup("main").unwrap();
        assert!(Arc::ptr_eq(handle.worker(), &looked_up));
        assert_eq!(registry.names(), vec!["main"]);
        assert_eq!(registry.driver_names(), vec!["mock"]);
        registry.shutdown().unwrap();
    }

    #[test]
    fn registry_mutations_rejected_on_worker_thread() {
        let (registry, _driver) = registry_with_mock();
        let registry = Arc::new(registry);
        let handle = registry
            .add_resource("main", "mock", ConnectParams::default())
            .unwrap();

        let inner = Arc::clone(&registry);
        let outcome = handle
            .bridge()
            .call(move || {
                (
                    inner.teardown("main").is_err(),
                    inner
                        .add_resource("other", "mock", ConnectParams::default())
                        .is_err(),
                    inner.shutdown().is_err(),
                )
            })
            .unwrap();
        assert_eq!(outcome, (true, true, true));
        assert_eq!(registry.names(), vec!["main"]);
        registry.shutdown().unwrap();
    }

    #[test]
    fn shutdown_is_idempotent_and_final() {
        let (registry, driver) = registry_with_mock();
        let a = registry
            .add_resource("a", "mock", ConnectParams::default())
            .unwrap();
        a.open().unwrap();

        registry.shutdown().unwrap();
        registry.shutdown().unwrap();
        assert!(registry.is_shut_down());
        assert!(registry.is_empty());
        assert!(matches!(
            a.open(),
            Err(ThreadboundError::WorkerUnavailable { .. })
        ));
        assert!(registry
            .add_resource("b", "mock", ConnectParams::default())
            .is_err());
        assert_eq!(driver.executed().len(), 0);
    }

    #[test]
    #[traced_test]
    fn registry_changes_are_logged() {
        let (registry, _driver) = registry_with_mock();
        registry
            .add_resource("logged", "mock", ConnectParams::default())
            .unwrap();
        registry.teardown("logged").unwrap();
        registry.shutdown().unwrap();
        assert!(logs_contain("resource registered"));
        assert!(logs_contain("resource torn down"));
        assert!(logs_contain("resource registry shut down"));
    }
}
