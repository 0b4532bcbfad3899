// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `threadbound query` command implementation.
//!
//! Runs one statement synchronously on a registered resource and prints the
//! records as a tab separated table or, with `--json`, as a JSON document.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use threadbound_core::{Direction, Record, ThreadboundError, Value};
use threadbound_query::QueryHandle;
use threadbound_worker::Registry;

/// Structured output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct QueryOutput {
    pub resource: String,
    pub success: bool,
    pub rows: Vec<Map<String, JsonValue>>,
    pub rows_affected: u64,
    pub last_insert_id: Option<Value>,
    pub error: Option<String>,
}

/// A `--bind` argument: `:name=value` binds a named placeholder, anything
/// else is the next positional value.
#[derive(Debug, Clone, PartialEq)]
pub enum BindArg {
    Positional(Value),
    Named(String, Value),
}

impl BindArg {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((name, value)) if name.starts_with(':') && name.len() > 1 => {
                BindArg::Named(name.to_string(), Value::parse_literal(value))
            }
            _ => BindArg::Positional(Value::parse_literal(raw)),
        }
    }
}

/// Execute `sql` on `resource`. Blocks until the statement finished.
pub fn execute(
    registry: &Registry,
    resource: &str,
    sql: &str,
    binds: &[BindArg],
) -> Result<QueryOutput, ThreadboundError> {
    let query = QueryHandle::with_statement(registry.resource(resource)?, sql);
    for bind in binds {
        match bind {
            BindArg::Positional(value) => query.add_bind_value(value.clone()),
            BindArg::Named(name, value) => query.bind_named(name, value.clone(), Direction::In),
        }
    }

    let success = query.exec();
    Ok(QueryOutput {
        resource: resource.to_string(),
        success,
        rows: query.records().iter().map(record_to_json).collect(),
        rows_affected: query.rows_affected(),
        last_insert_id: query.last_insert_id(),
        error: query.last_error().map(|e| e.to_string()),
    })
}

fn record_to_json(record: &Record) -> Map<String, JsonValue> {
    record
        .fields()
        .iter()
        .map(|field| {
            let value = serde_json::to_value(&field.value).unwrap_or(JsonValue::Null);
            (field.name.clone(), value)
        })
        .collect()
}

/// Render the output as plain text.
pub fn render_plain(output: &QueryOutput) -> String {
    if let Some(error) = &output.error {
        return format!("error: {error}\n");
    }
    let Some(first) = output.rows.first() else {
        let mut text = format!("{} row(s) affected", output.rows_affected);
        if let Some(id) = &output.last_insert_id {
            text.push_str(&format!(", last insert id {id}"));
        }
        text.push('\n');
        return text;
    };

    let mut text = first.keys().cloned().collect::<Vec<_>>().join("\t");
    text.push('\n');
    for row in &output.rows {
        let cells: Vec<String> = row
            .values()
            .map(|v| match v {
                JsonValue::Null => "NULL".to_string(),
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        text.push_str(&cells.join("\t"));
        text.push('\n');
    }
    text
}
