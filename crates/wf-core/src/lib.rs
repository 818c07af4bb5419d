//! wf-core: shared types, IDs, errors, configuration, presets, and the event
//! system.
//!
//! This crate is the foundational dependency for all other wf-* crates. It
//! holds the batch data model (sources, presets, probed media info), the
//! unified error type, application configuration, and a broadcast event bus
//! used to push per-source progress to whoever drives a batch.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod preset;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
pub use preset::{Padding, Preset, PresetRecord};
