// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread-affine resource execution for threadbound.
//!
//! Each registered resource gets one [`AffinityWorker`]: a named OS thread
//! that owns the resource's connection and runs submitted tasks one at a
//! time in FIFO order. Other threads reach it only through a [`Bridge`],
//! either fire-and-forget (`post`) or as a blocking round trip (`call`).
//! The [`Registry`] guarantees at most one worker per resource name.

pub mod bridge;
pub mod context;
pub mod registry;
pub mod resource;
pub mod worker;

pub use bridge::{Bridge, SubmitMode, Task};
pub use context::{on_worker_thread, with_resource, ResourceContext};
pub use registry::{DriverCatalog, Registry, RegistryOptions};
pub use resource::ResourceHandle;
pub use worker::{panic_message, AffinityWorker, WorkerState};
