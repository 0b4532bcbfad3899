// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource driver capability consumed by the worker layer.

use crate::error::DriverError;
use crate::types::{Command, ConnectParams, RecordSet};

/// Factory for connections to one kind of resource (SQLite, a mock, ...).
///
/// Drivers are registered by type name and shared between the registry and
/// the worker threads, so they must be `Send + Sync`. `open` is always called
/// on the worker thread that will own the returned connection.
pub trait Driver: Send + Sync + 'static {
    /// Type name used to look the driver up (e.g. `"sqlite"`).
    fn name(&self) -> &str;

    /// Open a new connection with the given parameters.
    fn open(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, DriverError>;
}

/// A live connection. Never leaves the thread that opened it, so
/// implementations need not be `Send`.
pub trait Connection {
    /// Execute a command and fully materialize its records.
    fn execute(&mut self, command: &Command) -> Result<RecordSet, DriverError>;

    fn begin(&mut self) -> Result<(), DriverError> {
        self.execute(&Command::text("BEGIN")).map(|_| ())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.execute(&Command::text("COMMIT")).map(|_| ())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.execute(&Command::text("ROLLBACK")).map(|_| ())
    }

    /// Close the connection, releasing driver resources.
    fn close(self: Box<Self>) -> Result<(), DriverError>;
}
