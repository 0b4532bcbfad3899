// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build the resource registry from configuration.

use std::sync::Arc;

use threadbound_config::ThreadboundConfig;
use threadbound_core::{ConnectParams, ThreadboundError};
use threadbound_sqlite::SqliteDriver;
use threadbound_worker::{Registry, RegistryOptions};
use tracing::{info, warn};

/// Name of the in-memory SQLite resource used when none is configured.
pub const FALLBACK_RESOURCE: &str = "mem";

/// Register every configured resource, opening those marked
/// `open_on_start`. Blocks while workers start and connections open, so
/// call it from a blocking context.
///
/// A resource that fails to open stays registered; its error is logged and
/// visible through the resource handle.
pub fn build_registry(config: &ThreadboundConfig) -> Result<Arc<Registry>, ThreadboundError> {
    let registry = Arc::new(Registry::new(RegistryOptions {
        thread_name_prefix: config.worker.thread_name_prefix.clone(),
    }));
    registry.register_driver(Arc::new(SqliteDriver::new()));

    if config.resources.is_empty() {
        info!(resource = FALLBACK_RESOURCE, "no resources configured, using in-memory sqlite");
        let mem = registry.add_resource(
            FALLBACK_RESOURCE,
            threadbound_sqlite::DRIVER_NAME,
            ConnectParams::database(":memory:"),
        )?;
        mem.open()?;
        return Ok(registry);
    }

    for resource in &config.resources {
        let handle =
            registry.add_resource(&resource.name, &resource.driver, resource.connect_params())?;
        if resource.open_on_start {
            if let Err(err) = handle.open() {
                warn!(resource = %resource.name, error = %err, "resource failed to open");
            }
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> ThreadboundConfig {
        threadbound_config::load_and_validate_str(toml).unwrap()
    }

    #[test]
    fn empty_config_falls_back_to_memory() {
        let registry = build_registry(&config("")).unwrap();
        assert_eq!(registry.names(), vec![FALLBACK_RESOURCE]);
        assert!(registry.resource(FALLBACK_RESOURCE).unwrap().is_open());
        registry.shutdown().unwrap();
    }

    #[test]
    fn configured_resources_are_registered() {
        let registry = build_registry(&config(
            r#"
            [worker]
            thread_name_prefix = "cli"

            [[resources]]
            name = "main"
            database_name = ":memory:"

            [[resources]]
            name = "later"
            database_name = ":memory:"
            open_on_start = false
            "#,
        ))
        .unwrap();

        assert_eq!(registry.names(), vec!["later", "main"]);
        assert!(registry.resource("main").unwrap().is_open());
        assert!(!registry.resource("later").unwrap().is_open());
        assert_eq!(registry.options().thread_name_prefix, "cli");
        registry.shutdown().unwrap();
    }

    #[test]
    fn unknown_driver_is_an_error() {
        let err = build_registry(&config(
            r#"
            [[resources]]
            name = "pg"
            driver = "postgres"
            "#,
        ))
        .unwrap_err();
        assert!(matches!(err, ThreadboundError::UnknownDriver { .. }));
    }
}
