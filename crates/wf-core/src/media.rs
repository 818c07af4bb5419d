//! Source-side data model: probed media info, source kinds, and the per-source
//! lifecycle state machine.
//!
//! All enums serialize in kebab-case and implement `Display` manually for
//! consistent string representation in logs and events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ids::SourceId;

/// File extensions accepted as batch sources (lowercase, without the dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm", "jpg", "jpeg", "png"];

/// File extensions treated as still images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether the path carries one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_source(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// MediaInfo
// ---------------------------------------------------------------------------

/// Probed metadata of a source: the only three properties the batch engine
/// cares about.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

impl MediaInfo {
    pub fn new(width: u32, height: u32, duration_secs: f64) -> Self {
        Self {
            width,
            height,
            duration_secs,
        }
    }

    /// Width / height, or `None` for a degenerate zero-height frame.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.height == 0 {
            None
        } else {
            Some(f64::from(self.width) / f64::from(self.height))
        }
    }

    /// The same frame size with a different duration.
    pub fn with_duration(self, duration_secs: f64) -> Self {
        Self {
            duration_secs,
            ..self
        }
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {:.2}s", self.width, self.height, self.duration_secs)
    }
}

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// Whether a source is a video clip or a still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Video,
    Image,
}

impl SourceKind {
    /// Classify by file extension; anything that is not a known still-image
    /// extension is treated as video.
    pub fn from_path(path: &Path) -> Self {
        match lowercase_extension(path) {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            _ => Self::Video,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a source within a batch.
///
/// ```text
/// discovered -> probing -> { pending | error-probing }
/// pending    -> processing -> { completed | error | cancelled }
/// error | error-probing | cancelled -> discovered   (resubmission)
/// ```
///
/// Sources that never got a worker slot go straight from `discovered` or
/// `pending` to `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStatus {
    Discovered,
    Probing,
    Pending,
    Processing,
    Completed,
    Error,
    ErrorProbing,
    Cancelled,
}

impl SourceStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SourceStatus) -> bool {
        use SourceStatus::*;
        matches!(
            (self, next),
            (Discovered, Probing)
                | (Discovered, Cancelled)
                | (Probing, Pending)
                | (Probing, ErrorProbing)
                | (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Error)
                | (Processing, Cancelled)
                | (Error, Discovered)
                | (ErrorProbing, Discovered)
                | (Cancelled, Discovered)
        )
    }

    /// `completed` is the only state a source never leaves.
    pub fn is_terminal(self) -> bool {
        self == SourceStatus::Completed
    }

    /// Failure states that may be resubmitted.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            SourceStatus::Error | SourceStatus::ErrorProbing | SourceStatus::Cancelled
        )
    }

    /// Whether the source has reached an outcome for the current batch.
    pub fn is_finished(self) -> bool {
        self.is_terminal() || self.is_retryable()
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discovered => "discovered",
            Self::Probing => "probing",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::ErrorProbing => "error-probing",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// SourceItem
// ---------------------------------------------------------------------------

/// One input file and everything the engine knows about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    pub id: SourceId,
    pub path: PathBuf,
    pub kind: SourceKind,
    pub status: SourceStatus,
    /// Probed metadata; `None` until probing succeeds.
    pub info: Option<MediaInfo>,
    /// Percent of the preset currently rendering (reset per preset).
    pub progress: u8,
    /// Last error message, if any.
    pub error: Option<String>,
    /// Final paths of the outputs produced for this source.
    pub outputs: Vec<PathBuf>,
}

impl SourceItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            id: SourceId::new(),
            kind: SourceKind::from_path(&path),
            path,
            status: SourceStatus::Discovered,
            info: None,
            progress: 0,
            error: None,
            outputs: Vec::new(),
        }
    }

    /// File name for log lines.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}
