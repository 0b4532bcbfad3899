// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./threadbound.toml` > `~/.config/threadbound/threadbound.toml`
//! > `/etc/threadbound/threadbound.toml` with environment variable overrides via
//! the `THREADBOUND_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ThreadboundConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/threadbound/threadbound.toml";
pub const LOCAL_CONFIG_PATH: &str = "threadbound.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/threadbound/threadbound.toml`
/// 3. `~/.config/threadbound/threadbound.toml`
/// 4. `./threadbound.toml`
/// 5. `THREADBOUND_*` environment variables
pub fn load_config() -> Result<ThreadboundConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ThreadboundConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ThreadboundConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ThreadboundConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ThreadboundConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ThreadboundConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

pub(crate) fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("threadbound").join("threadbound.toml"))
}

/// Environment provider with explicit section mapping.
///
/// `THREADBOUND_WORKER_THREAD_NAME_PREFIX` must map to
/// `worker.thread_name_prefix`, so keys are split on the section name only,
/// never on every underscore.
fn env_provider() -> Env {
    Env::prefixed("THREADBOUND_").map(|key| {
        key.as_str()
            .replacen("logging_", "logging.", 1)
            .replacen("worker_", "worker.", 1)
            .into()
    })
}
