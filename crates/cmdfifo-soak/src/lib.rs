//! Soak and throughput driver for the `cmdfifo` command channel.
//!
//! A control thread streams render-style commands (clears, state changes,
//! triangles, vsync) through the FIFO to a worker thread, which decodes and
//! verifies every record in order.

/// Render command encoding.
pub mod commands;

/// Deterministic frame script.
pub mod scene;

/// Soak runner.
pub mod soak;

pub use commands::{DecodeError, RenderCommand};
pub use soak::{run_soak, SoakConfig, SoakError, SoakReport};
