//! Unified error type for wallforge.
//!
//! All crates funnel their failures into [`Error`]. The variants mirror the
//! batch failure taxonomy: probe and render failures are isolated to one
//! source, filesystem failures abort the whole batch, and everything carries
//! enough text to be shown to the user verbatim.

use std::fmt;
use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in wallforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "preset", "source").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation conflicts with work already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media metadata could not be extracted.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Rendering one preset failed.
    #[error("Render error [{preset}]: {message}")]
    Render {
        /// The preset being rendered.
        preset: String,
        /// Human-readable error description.
        message: String,
    },

    /// Creating a directory or moving a file failed.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// The path the operation was acting on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The operation was cancelled before it finished.
    #[error("Cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to a process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) => 2,
            Error::Conflict(_) => 3,
            Error::Tool { .. } | Error::Probe(_) | Error::Render { .. } => 4,
            Error::Filesystem { .. } => 5,
            Error::Cancelled => 130,
            Error::NotFound { .. } | Error::Io { .. } | Error::Internal(_) => 1,
        }
    }

    /// Whether this failure must abort the whole batch rather than a single
    /// source.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Error::Filesystem { .. })
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Render`].
    pub fn render(preset: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Render {
            preset: preset.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Filesystem`].
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("preset", "WFHD");
        assert_eq!(err.to_string(), "preset not found: WFHD");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("width must be positive".into());
        assert_eq!(err.to_string(), "Validation error: width must be positive");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn conflict_display() {
        let err = Error::Conflict("a batch is already running".into());
        assert_eq!(err.to_string(), "Conflict: a batch is already running");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert!(!err.is_batch_fatal());
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn render_display() {
        let err = Error::render("WFHD", "ffmpeg exited with status 1");
        assert_eq!(
            err.to_string(),
            "Render error [WFHD]: ffmpeg exited with status 1"
        );
        assert!(!err.is_batch_fatal());
    }

    #[test]
    fn filesystem_is_batch_fatal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::filesystem("/work/Antigos", io_err);
        assert!(err.is_batch_fatal());
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("/work/Antigos"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn cancelled_exit_code() {
        assert_eq!(Error::Cancelled.exit_code(), 130);
        assert_eq!(Error::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::Internal("boom".into()))
        }
        assert!(err_fn().is_err());
    }
}
