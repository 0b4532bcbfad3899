// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `threadbound resources` command implementation.

use serde::Serialize;
use threadbound_core::ThreadboundError;
use threadbound_worker::Registry;

#[derive(Debug, Serialize)]
pub struct ResourceStatus {
    pub name: String,
    pub driver: String,
    pub database: String,
    pub open: bool,
    /// The last open attempt failed.
    pub open_error: bool,
    pub worker: String,
    pub last_error: Option<String>,
}

/// Describe every registered resource. Asks each worker for its state, so
/// call it from a blocking context.
pub fn list(registry: &Registry) -> Result<Vec<ResourceStatus>, ThreadboundError> {
    registry
        .names()
        .into_iter()
        .map(|name| {
            let handle = registry.resource(&name)?;
            Ok(ResourceStatus {
                driver: handle.driver_name()?,
                database: handle.database_name()?,
                open: handle.is_open(),
                open_error: handle.is_open_error(),
                worker: handle.worker().state().to_string(),
                last_error: handle.last_error().map(|e| e.to_string()),
                name,
            })
        })
        .collect()
}

pub fn render_plain(statuses: &[ResourceStatus]) -> String {
    let mut text = String::new();
    for status in statuses {
        let state = if status.open { "open" } else { "closed" };
        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            status.name, status.driver, status.database, state, status.worker
        ));
        if let Some(error) = &status.last_error {
            text.push_str(&format!("  last error: {error}\n"));
        }
    }
    text
}

/// True when any resource failed to open.
pub fn any_failed(statuses: &[ResourceStatus]) -> bool {
    statuses.iter().any(|s| s.open_error)
}
