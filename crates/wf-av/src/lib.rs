//! # wf-av
//!
//! External media tool plumbing for wallforge.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   line-streamed stderr and cancellation.
//! - **Probing** ([`FfprobeProber`]) -- width, height and duration via ffprobe.
//! - **Rendering** ([`RenderRequest`], [`RenderInvoker`], [`FfmpegInvoker`])
//!   -- filter construction and progress-reporting ffmpeg runs.
//! - **File lifecycle** ([`files`], [`WorkspaceLayout`], [`TempFiles`]) --
//!   directory setup, moves, collision-free naming and cleanup.

pub mod command;
pub mod files;
pub mod filter;
pub mod invoker;
pub mod probe;
pub mod render;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use files::DirectoryLocks;
pub use invoker::{FfmpegInvoker, ProgressFn, RenderInvoker};
pub use probe::FfprobeProber;
pub use render::{Filter, ProgressTracker, RenderRequest};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::{close_scratch, scratch_dir_in, TempFiles, WorkspaceLayout};
