// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for threadbound integration tests.
//!
//! Provides an instrumented driver and a blocking gate for deterministic,
//! thread-aware tests without a real database.
//!
//! # Components
//!
//! - [`MockDriver`] - Driver that records every call with the calling thread
//! - [`Gate`] - Two-sided rendezvous used to hold a worker at a known point

pub mod gate;
pub mod mock_driver;

pub use gate::Gate;
pub use mock_driver::{sample_records, MockCall, MockDriver, MockOp};
