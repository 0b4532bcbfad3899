// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: resource names must be unique and
//! non-empty, the log level must be one `tracing` understands, and the worker
//! thread prefix must be usable in a thread name.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::ThreadboundConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of stopping at the first.
pub fn validate_config(config: &ThreadboundConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.logging.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.log_level `{}` is not one of {}",
            config.logging.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let prefix = &config.worker.thread_name_prefix;
    if prefix.trim().is_empty() {
        errors.push(ConfigError::validation(
            "worker.thread_name_prefix must not be empty",
        ));
    } else if prefix.contains('\0') {
        errors.push(ConfigError::validation(
            "worker.thread_name_prefix must not contain NUL bytes",
        ));
    }

    let mut seen = HashSet::new();
    for (i, resource) in config.resources.iter().enumerate() {
        if resource.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "resources[{i}].name must not be empty"
            )));
        } else if !seen.insert(resource.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate resource name `{}` in [[resources]] array",
                resource.name
            )));
        }

        if resource.driver.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "resources[{i}].driver must not be empty"
            )));
        }

        if resource.port == Some(0) {
            errors.push(ConfigError::validation(format!(
                "resources[{i}].port must be between 1 and 65535"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceConfig;

    fn resource(name: &str) -> ResourceConfig {
        ResourceConfig {
            name: name.to_string(),
            driver: "sqlite".to_string(),
            database_name: ":memory:".to_string(),
            host_name: None,
            port: None,
            user_name: None,
            password: None,
            options: None,
            open_on_start: true,
        }
    }

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&ThreadboundConfig::default()).is_ok());
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = ThreadboundConfig::default();
        config.logging.log_level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = ThreadboundConfig::default();
        config.logging.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "logging.log_level"));
    }

    #[test]
    fn empty_thread_prefix_fails() {
        let mut config = ThreadboundConfig::default();
        config.worker.thread_name_prefix = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "thread_name_prefix"));
    }

    #[test]
    fn duplicate_resource_names_fail() {
        let config = ThreadboundConfig {
            resources: vec![resource("main"), resource("main")],
            ..ThreadboundConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "duplicate resource name `main`"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut bad = resource("");
        bad.driver = String::new();
        bad.port = Some(0);
        let mut config = ThreadboundConfig {
            resources: vec![bad],
            ..ThreadboundConfig::default()
        };
        config.logging.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(has_message(&errors, "resources[0].name"));
        assert!(has_message(&errors, "resources[0].driver"));
        assert!(has_message(&errors, "resources[0].port"));
    }

    #[test]
    fn distinct_resources_pass() {
        let config = ThreadboundConfig {
            resources: vec![resource("main"), resource("audit")],
            ..ThreadboundConfig::default()
        };
        assert!(validate_config(&config).is_ok());
    }
}
