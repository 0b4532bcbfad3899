// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driver trait definitions.
//!
//! A [`Driver`] is shared across threads and opens connections; the
//! [`Connection`] it returns is owned by exactly one worker thread.

pub mod driver;

pub use driver::{Connection, Driver};
