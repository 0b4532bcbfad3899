// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for threadbound.
//!
//! Three layers of errors exist:
//! - [`DriverError`] is what a resource driver reports.
//! - [`ThreadboundError`] is returned by registry, worker and resource operations.
//! - [`QueryError`] is the cloneable error stored in a query handle's result state.

use thiserror::Error;

/// Error reported by a resource driver (open, execute, transaction control).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Human readable message from the driver.
    pub message: String,
    /// Driver specific error code, when the driver exposes one.
    pub code: Option<i32>,
}

impl DriverError {
    /// Create a driver error without a code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a driver specific error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

/// The primary error type for resource, worker and registry operations.
#[derive(Debug, Error)]
pub enum ThreadboundError {
    /// The driver refused to open a connection.
    #[error("failed to open resource `{resource}`: {source}")]
    ConnectOpenFailed {
        resource: String,
        #[source]
        source: DriverError,
    },

    /// The resource has no open connection.
    #[error("resource `{resource}` is not open")]
    ConnectionUnavailable { resource: String },

    /// A statement or transaction control call ran but failed.
    #[error("execution failed on resource `{resource}`: {source}")]
    ExecutionFailed {
        resource: String,
        #[source]
        source: DriverError,
    },

    /// The worker thread owning the resource is gone or no longer accepts tasks.
    #[error("worker for resource `{resource}` is unavailable")]
    WorkerUnavailable { resource: String },

    /// No resource is registered under the given name.
    #[error("resource not found: {name}")]
    ResourceNotFound { name: String },

    /// No driver is registered under the given type name.
    #[error("unknown driver type: {driver}")]
    UnknownDriver { driver: String },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Misuse or unexpected internal state.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error recorded in a query handle's result state and reported through
/// `last_error()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The resource is not open.
    #[error("resource `{resource}` is not open")]
    ConnectionUnavailable { resource: String },

    /// The statement ran but the driver reported a failure.
    #[error("statement failed: {message}")]
    ExecutionFailed {
        message: String,
        code: Option<i32>,
    },

    /// The owning worker thread is gone.
    #[error("worker for resource `{resource}` is unavailable")]
    WorkerUnavailable { resource: String },
}

impl QueryError {
    /// Wrap a driver failure.
    pub fn execution(err: &DriverError) -> Self {
        QueryError::ExecutionFailed {
            message: err.message.clone(),
            code: err.code,
        }
    }
}

impl From<ThreadboundError> for QueryError {
    fn from(err: ThreadboundError) -> Self {
        match err {
            ThreadboundError::ConnectionUnavailable { resource } => {
                QueryError::ConnectionUnavailable { resource }
            }
            ThreadboundError::WorkerUnavailable { resource } => {
                QueryError::WorkerUnavailable { resource }
            }
            ThreadboundError::ConnectOpenFailed { source, .. }
            | ThreadboundError::ExecutionFailed { source, .. } => QueryError::execution(&source),
            other => QueryError::ExecutionFailed {
                message: other.to_string(),
                code: None,
            },
        }
    }
}
