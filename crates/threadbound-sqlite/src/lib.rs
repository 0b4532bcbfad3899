// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite driver for threadbound, backed by `rusqlite`.
//!
//! A [`SqliteDriver`] is registered under the type name `"sqlite"`. The
//! database name is a file path; an empty name or `:memory:` opens a private
//! in-memory database. Connection options (`key=value;...`) are applied as
//! pragmas right after opening, e.g. `foreign_keys=on;busy_timeout=500`.

mod driver;
mod value;

pub use driver::{SqliteConnection, SqliteDriver, DRIVER_NAME};
