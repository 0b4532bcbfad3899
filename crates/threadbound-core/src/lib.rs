// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for threadbound.
//!
//! This crate provides the error taxonomy, the value/command/record model and
//! the driver traits used throughout the workspace. Drivers implement the
//! traits defined here; the worker and query crates only ever talk to them
//! through these traits.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{DriverError, QueryError, ThreadboundError};
pub use traits::{Connection, Driver};
pub use types::{
    Binding, Command, ConnectParams, Direction, Field, NamedBinding, Record, RecordSet, Value,
};
