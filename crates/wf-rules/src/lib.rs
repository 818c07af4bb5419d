//! # wf-rules
//!
//! Pure decision tables for the batch engine.
//!
//! - [`is_compatible`] -- may a preset be applied to a probed source?
//! - [`NamingTable`] -- which signage tag does a rendered preset get, and
//!   what is its output base name?
//!
//! Nothing here touches the filesystem or spawns processes.

pub mod compat;
pub mod naming;

pub use compat::{compatible_presets, is_compatible, DURATION_TOLERANCE_SECS};
pub use naming::{date_stamp, FormatRule, NamingTable, DEFAULT_CLIENT_LABEL};
