//! # wf-queue
//!
//! Batch scheduling and orchestration for wallforge.
//!
//! [`QueueEngine`] takes a [`Batch`] of sources and presets and runs one
//! pipeline per source (probe, still-image conversion, compatible-preset
//! renders, naming, archival) on a bounded worker pool, with cooperative
//! pause/resume and cancellation. [`SuperLedComposer`] builds the three-panel
//! wall composite through the same render seam.

pub mod control;
pub mod discover;
pub mod engine;
mod job;
pub mod log;
pub mod sources;
pub mod superled;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use control::{QueueControl, QueueStateSnapshot};
pub use discover::discover_sources;
pub use engine::{Batch, BatchReport, QueueEngine};
pub use log::BatchLog;
pub use sources::SourceTable;
pub use superled::{SuperLedComposer, SuperLedRequest};
