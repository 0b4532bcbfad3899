// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `threadbound demo` command implementation.
//!
//! Walks through the asynchronous side of the engine: a batch insert that
//! completes through a `ResultsReady` event, then a burst of result model
//! requests that coalesce down to the last one.

use std::sync::Arc;

use rand::Rng;
use threadbound_core::{Direction, ThreadboundError, Value};
use threadbound_query::{ModelEvent, QueryEvent, QueryHandle, ResultModel};
use threadbound_worker::Registry;
use tokio::sync::broadcast;
use tracing::{debug, info};

const LABELS: [&str; 6] = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];

/// What the demo observed, for printing and tests.
#[derive(Debug)]
pub struct DemoReport {
    pub inserted: u64,
    pub model_rows: usize,
    pub top: Vec<(String, f64)>,
}

pub async fn run(
    registry: Arc<Registry>,
    resource: &str,
    rows: usize,
) -> Result<DemoReport, ThreadboundError> {
    let handle = registry.resource(resource)?;
    let query = QueryHandle::new(handle);
    let mut events = query.subscribe();

    query
        .exec_sql_async("CREATE TABLE IF NOT EXISTS demo (id INTEGER PRIMARY KEY, label TEXT, score REAL)")
        .map_err(|e| ThreadboundError::Internal(e.to_string()))?;
    completion(&query, &mut events).await?;

    let (labels, scores) = random_rows(rows);
    query.prepare("INSERT INTO demo (label, score) VALUES (?, ?)");
    query.bind_positional(Value::List(labels), Direction::In);
    query.bind_positional(Value::List(scores), Direction::In);
    query
        .exec_batch_async()
        .map_err(|e| ThreadboundError::Internal(e.to_string()))?;
    completion(&query, &mut events).await?;
    let inserted = query.rows_affected();
    info!(resource, inserted, "batch insert finished");

    // Every request but the last is either running or replaced by the next.
    let model = ResultModel::new(Arc::clone(&registry));
    let mut model_events = model.subscribe();
    for label in LABELS {
        model.set_query_async(
            format!("SELECT label, score FROM demo WHERE label = '{label}' ORDER BY score DESC"),
            resource,
        )?;
    }
    model.set_query_async(
        "SELECT label, score FROM demo ORDER BY score DESC LIMIT 5",
        resource,
    )?;
    settle(&model, &mut model_events).await?;

    let top = model
        .rows()
        .iter()
        .filter_map(|record| {
            let label = record.value_by_name("label")?.as_str()?.to_string();
            match record.value_by_name("score")? {
                Value::Real(score) => Some((label, *score)),
                _ => None,
            }
        })
        .collect();

    Ok(DemoReport {
        inserted,
        model_rows: model.row_count(),
        top,
    })
}

fn random_rows(count: usize) -> (Vec<Value>, Vec<Value>) {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let label = LABELS[rng.gen_range(0..LABELS.len())];
            let score: f64 = rng.gen_range(0.0..100.0);
            (Value::from(label), Value::Real((score * 100.0).round() / 100.0))
        })
        .unzip()
}

/// Wait for the next completion of `query`.
async fn completion(
    query: &QueryHandle,
    events: &mut broadcast::Receiver<QueryEvent>,
) -> Result<(), ThreadboundError> {
    loop {
        match events.recv().await {
            Ok(QueryEvent::ResultsReady { success: true, .. }) => return Ok(()),
            Ok(QueryEvent::ResultsReady { success: false, .. }) => {
                let message = query
                    .last_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "statement failed".to_string());
                return Err(ThreadboundError::Internal(message));
            }
            Ok(QueryEvent::BusyChanged { busy }) => debug!(busy, "demo query busy state"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "demo lagged behind query events");
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(ThreadboundError::Internal("query event stream closed".into()));
            }
        }
    }
}

/// Wait until the model has refreshed and has nothing left to run.
async fn settle(
    model: &ResultModel,
    events: &mut broadcast::Receiver<ModelEvent>,
) -> Result<(), ThreadboundError> {
    loop {
        match events.recv().await {
            Ok(ModelEvent::Reset { rows }) => {
                debug!(rows, "model refreshed");
                if !model.is_busy() {
                    return Ok(());
                }
            }
            Ok(ModelEvent::QueryFailed { error }) => {
                return Err(ThreadboundError::Internal(error.to_string()));
            }
            Ok(ModelEvent::AboutToReset) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                return Err(ThreadboundError::Internal("model event stream closed".into()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadbound_core::ConnectParams;
    use threadbound_sqlite::SqliteDriver;

    #[test]
    fn random_rows_have_matching_lengths() {
        let (labels, scores) = random_rows(12);
        assert_eq!(labels.len(), 12);
        assert_eq!(scores.len(), 12);
        assert!(scores
            .iter()
            .all(|s| matches!(s, Value::Real(r) if (0.0..=100.0).contains(r))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn demo_inserts_and_reports_top_rows() {
        let registry = Arc::new(Registry::default());
        registry.register_driver(Arc::new(SqliteDriver::new()));
        let setup = Arc::clone(&registry);
        tokio::task::spawn_blocking(move || {
            setup
                .add_resource("mem", "sqlite", ConnectParams::database(":memory:"))?
                .open()
        })
        .await
        .unwrap()
        .unwrap();

        let report = run(Arc::clone(&registry), "mem", 40).await.unwrap();
        assert_eq!(report.inserted, 40);
        assert_eq!(report.model_rows, 5);
        assert_eq!(report.top.len(), 5);
        assert!(report.top.windows(2).all(|w| w[0].1 >= w[1].1));

        tokio::task::spawn_blocking(move || registry.shutdown())
            .await
            .unwrap()
            .unwrap();
    }
}
