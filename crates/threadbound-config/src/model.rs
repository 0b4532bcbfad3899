// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use threadbound_core::ConnectParams;

/// Top-level threadbound configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadboundConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Affinity worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Resources registered at startup, one worker each.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Affinity worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Worker threads are named `<prefix>-<resource>`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

fn default_thread_name_prefix() -> String {
    "threadbound".to_string()
}

/// A named resource and the parameters its driver opens it with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Registry key for the resource.
    pub name: String,

    /// Driver type name.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Database name or path (`:memory:` for an in-memory SQLite database).
    #[serde(default)]
    pub database_name: String,

    #[serde(default)]
    pub host_name: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Driver specific `key=value;...` options.
    #[serde(default)]
    pub options: Option<String>,

    /// Open the connection right after registration.
    #[serde(default = "default_open_on_start")]
    pub open_on_start: bool,
}

impl ResourceConfig {
    /// Connection parameters handed to the driver.
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            database_name: self.database_name.clone(),
            host_name: self.host_name.clone(),
            port: self.port,
            user_name: self.user_name.clone(),
            password: self.password.clone(),
            options: self.options.clone(),
        }
    }
}

fn default_driver() -> String {
    "sqlite".to_string()
}

fn default_open_on_start() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_defaults_fill_in() {
        let config: ThreadboundConfig = toml::from_str(
            r#"
[[resources]]
name = "mem"
"#,
        )
        .unwrap();
        let resource = &config.resources[0];
        assert_eq!(resource.driver, "sqlite");
        assert!(resource.open_on_start);
        assert!(resource.database_name.is_empty());
        assert_eq!(resource.connect_params().database_name, "");
    }

    #[test]
    fn resources_deny_unknown_fields() {
        let result = toml::from_str::<ThreadboundConfig>(
            r#"
[[resources]]
name = "mem"
pool_size = 4
"#,
        );
        assert!(result.is_err());
    }
}
