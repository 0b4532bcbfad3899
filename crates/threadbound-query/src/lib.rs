// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side query execution for threadbound.
//!
//! [`QueryHandle`] is the per-client command/result state machine: it stages
//! statements and bindings, runs them on the resource's affinity worker
//! synchronously or asynchronously, suppresses results of overwritten
//! submissions, and exposes a cursor over the published records.
//! [`ResultModel`] layers a coalescing, table-shaped snapshot on top.

mod command;
pub mod events;
pub mod model;
pub mod query;
pub mod result;

pub use events::{ListenerId, ModelEvent, QueryEvent};
pub use model::ResultModel;
pub use query::QueryHandle;
pub use result::ResultState;
