// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the threadbound configuration system.

use std::io::Write;

use threadbound_config::diagnostic::ConfigError;
use threadbound_config::model::ThreadboundConfig;
use threadbound_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_config_deserializes() {
    let toml = r#"
[logging]
log_level = "debug"

[worker]
thread_name_prefix = "tb"

[[resources]]
name = "main"
database_name = "/var/lib/app/main.db"
options = "busy_timeout=500"

[[resources]]
name = "reports"
driver = "sqlite"
database_name = ":memory:"
host_name = "db.internal"
port = 5432
user_name = "reporter"
password = "secret"
open_on_start = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.logging.log_level, "debug");
    assert_eq!(config.worker.thread_name_prefix, "tb");
    assert_eq!(config.resources.len(), 2);

    let main = &config.resources[0];
    assert_eq!(main.name, "main");
    assert_eq!(main.driver, "sqlite");
    assert!(main.open_on_start);
    assert_eq!(main.options.as_deref(), Some("busy_timeout=500"));

    let reports = &config.resources[1];
    assert!(!reports.open_on_start);
    assert_eq!(reports.port, Some(5432));

    let params = reports.connect_params();
    assert_eq!(params.database_name, ":memory:");
    assert_eq!(params.host_name.as_deref(), Some("db.internal"));
    assert_eq!(params.user_name.as_deref(), Some("reporter"));
    assert_eq!(params.password.as_deref(), Some("secret"));
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.logging.log_level, "info");
    assert_eq!(config.worker.thread_name_prefix, "threadbound");
    assert!(config.resources.is_empty());
}

#[test]
fn resource_requires_name() {
    let toml = r#"
[[resources]]
database_name = ":memory:"
"#;
    let errors = load_and_validate_str(toml).expect_err("name is required");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingKey { key } if key == "name")),
        "expected MissingKey for name, got: {errors:?}"
    );
}

#[test]
fn unknown_resource_key_suggests_correction() {
    let toml = r#"
[[resources]]
name = "main"
databse_name = "app.db"
"#;
    let errors = load_and_validate_str(toml).expect_err("typo should be rejected");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "databse_name"
                && suggestion.as_deref() == Some("database_name")
                && valid_keys.contains("open_on_start")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn unknown_top_level_section_rejected() {
    let toml = r#"
[storage]
database_path = "x.db"
"#;
    let err = load_config_from_str(toml).expect_err("unknown section should be rejected");
    let msg = err.to_string();
    assert!(
        msg.contains("unknown field") || msg.contains("storage"),
        "got: {msg}"
    );
}

#[test]
fn invalid_type_reports_key_path() {
    let toml = r#"
[worker]
thread_name_prefix = 12
"#;
    let errors = load_and_validate_str(toml).expect_err("wrong type should be rejected");
    assert!(
        errors.iter().any(
            |e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("thread_name_prefix"))
        ),
        "got: {errors:?}"
    );
}

#[test]
fn validation_runs_after_deserialization() {
    let toml = r#"
[[resources]]
name = "dup"

[[resources]]
name = "dup"
"#;
    let errors = load_and_validate_str(toml).expect_err("duplicate names should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("duplicate"))
    ));
}

#[test]
fn dotted_override_maps_to_nested_key() {
    use figment::{providers::Serialized, Figment};

    let config: ThreadboundConfig = Figment::new()
        .merge(Serialized::defaults(ThreadboundConfig::default()))
        .merge(("worker.thread_name_prefix", "from-env"))
        .merge(("logging.log_level", "warn"))
        .extract()
        .expect("dotted keys should merge");
    assert_eq!(config.worker.thread_name_prefix, "from-env");
    assert_eq!(config.logging.log_level, "warn");
}

#[test]
fn missing_config_file_is_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: ThreadboundConfig = Figment::new()
        .merge(Serialized::defaults(ThreadboundConfig::default()))
        .merge(Toml::file("/nonexistent/threadbound.toml"))
        .extract()
        .expect("missing file should be skipped");
    assert_eq!(config.worker.thread_name_prefix, "threadbound");
}

#[test]
fn explicit_path_is_loaded_and_validated() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[[resources]]\nname = \"disk\"\ndatabase_name = \"disk.db\"\nopen_on_start = false"
    )
    .expect("write config");

    let config = load_and_validate_path(file.path()).expect("file config should validate");
    assert_eq!(config.resources.len(), 1);
    assert_eq!(config.resources[0].name, "disk");
    assert!(!config.resources[0].open_on_start);
}

#[test]
fn unknown_key_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "drvier".to_string(),
        suggestion: Some("driver".to_string()),
        valid_keys: "name, driver, database_name".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    let help = error.help().map(|h| h.to_string()).unwrap_or_default();
    assert!(help.contains("did you mean `driver`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("drvier"));
}
