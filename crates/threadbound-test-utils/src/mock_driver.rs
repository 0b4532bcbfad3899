// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock resource driver for deterministic, thread-aware testing.
//!
//! `MockDriver` implements `Driver` and records every operation together with
//! the id of the thread that performed it, so tests can assert that a
//! connection was only ever touched from its worker. Statement results can be
//! scripted, and a [`Gate`] can hold execution of a given statement.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use threadbound_core::{
    Command, ConnectParams, Connection, Driver, DriverError, Record, RecordSet, Value,
};

use crate::gate::Gate;

/// Kind of operation the mock observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Open,
    /// Statement text of an executed command.
    Execute(String),
    Close,
}

/// One recorded operation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub op: MockOp,
    pub thread: ThreadId,
    /// Sequence number carried by the command (0 for open/close).
    pub sequence: u64,
}

/// A driver that never touches a real database.
///
/// Cloning shares the recorded calls and scripted behavior.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<MockState>,
}

struct MockState {
    name: String,
    calls: Mutex<Vec<MockCall>>,
    responses: Mutex<HashMap<String, Result<RecordSet, DriverError>>>,
    gates: Mutex<HashMap<String, Gate>>,
    panics: Mutex<HashSet<String>>,
    open_error: Mutex<Option<DriverError>>,
    opened_with: Mutex<Option<ConnectParams>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockDriver {
    /// Create a mock registered under the type name `mock`.
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: &str) -> Self {
        Self {
            state: Arc::new(MockState {
                name: name.to_string(),
                calls: Mutex::new(Vec::new()),
                responses: Mutex::new(HashMap::new()),
                gates: Mutex::new(HashMap::new()),
                panics: Mutex::new(HashSet::new()),
                open_error: Mutex::new(None),
                opened_with: Mutex::new(None),
            }),
        }
    }

    /// Script the outcome of every execution of `statement`.
    pub fn respond(&self, statement: &str, outcome: Result<RecordSet, DriverError>) {
        lock(&self.state.responses).insert(statement.to_string(), outcome);
    }

    /// Script `statement` to return the given records.
    pub fn respond_rows(&self, statement: &str, records: Vec<Record>) {
        self.respond(
            statement,
            Ok(RecordSet {
                records,
                ..RecordSet::default()
            }),
        );
    }

    /// Script `statement` to fail.
    pub fn fail(&self, statement: &str, message: &str) {
        self.respond(statement, Err(DriverError::new(message)));
    }

    /// Make every execution of `statement` panic inside the driver.
    pub fn panic_on(&self, statement: &str) {
        lock(&self.state.panics).insert(statement.to_string());
    }

    /// Make the next `open` calls fail.
    pub fn fail_open(&self, message: &str) {
        *lock(&self.state.open_error) = Some(DriverError::new(message));
    }

    /// Hold every execution of `statement` at the returned gate.
    pub fn gate(&self, statement: &str) -> Gate {
        lock(&self.state.gates)
            .entry(statement.to_string())
            .or_default()
            .clone()
    }

    /// Everything recorded so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.state.calls).clone()
    }

    /// Statement texts executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call.op {
                MockOp::Execute(statement) => Some(statement),
                _ => None,
            })
            .collect()
    }

    /// Distinct threads that performed any recorded operation.
    pub fn threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<ThreadId> = Vec::new();
        for call in lock(&self.state.calls).iter() {
            if !threads.contains(&call.thread) {
                threads.push(call.thread);
            }
        }
        threads
    }

    /// Parameters of the most recent successful open.
    pub fn opened_with(&self) -> Option<ConnectParams> {
        lock(&self.state.opened_with).clone()
    }

    fn record(&self, op: MockOp, sequence: u64) {
        lock(&self.state.calls).push(MockCall {
            op,
            thread: thread::current().id(),
            sequence,
        });
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, DriverError> {
        self.record(MockOp::Open, 0);
        if let Some(err) = lock(&self.state.open_error).clone() {
            return Err(err);
        }
        *lock(&self.state.opened_with) = Some(params.clone());
        Ok(Box::new(MockConnection {
            driver: self.clone(),
        }))
    }
}

struct MockConnection {
    driver: MockDriver,
}

impl Connection for MockConnection {
    fn execute(&mut self, command: &Command) -> Result<RecordSet, DriverError> {
        self.driver
            .record(MockOp::Execute(command.statement.clone()), command.sequence);
        tracing::trace!(statement = %command.statement, "mock execute");

        // Clone out of the lock before blocking so other statements stay usable.
        let gate = lock(&self.driver.state.gates)
            .get(&command.statement)
            .cloned();
        if let Some(gate) = gate {
            gate.pass();
        }
        if lock(&self.driver.state.panics).contains(&command.statement) {
            panic!("mock driver panicked on `{}`", command.statement);
        }

        lock(&self.driver.state.responses)
            .get(&command.statement)
            .cloned()
            .unwrap_or_else(|| Ok(RecordSet::default()))
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.driver.record(MockOp::Close, 0);
        Ok(())
    }
}

/// `count` records with an integer `id` (1-based) and a text `name`.
pub fn sample_records(count: usize) -> Vec<Record> {
    (1..=count)
        .map(|i| {
            Record::from_pairs([
                ("id", Value::Integer(i as i64)),
                ("name", Value::Text(format!("row-{i}"))),
            ])
        })
        .collect()
}
