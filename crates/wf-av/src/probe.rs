//! ffprobe-backed metadata extraction.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and reduces the answer to the [`MediaInfo`] triple the batch engine needs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use wf_core::MediaInfo;

use crate::command::ToolCommand;

/// Duration assumed when the container does not report one (still images).
pub const FALLBACK_DURATION_SECS: f64 = 10.0;

const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Probe `path`, returning `None` for anything that is not a readable
    /// media file with a video stream. Never fails.
    pub async fn probe(&self, path: &Path) -> Option<MediaInfo> {
        match self.try_probe(path).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(source = %path.display(), "Probe failed: {e}");
                None
            }
        }
    }

    /// Probe `path`, reporting why it could not be classified.
    pub async fn try_probe(&self, path: &Path) -> wf_core::Result<MediaInfo> {
        let meta = std::fs::metadata(path)
            .map_err(|e| wf_core::Error::Probe(format!("{}: {e}", path.display())))?;
        if !meta.is_file() {
            return Err(wf_core::Error::Probe(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let output = ToolCommand::new(self.ffprobe_path.clone())
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path.to_string_lossy().as_ref())
            .timeout(PROBE_TIMEOUT)
            .execute()
            .await?;

        parse_ffprobe_json(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Reduce ffprobe's JSON to [`MediaInfo`].
///
/// Uses the first video stream. A missing or unparsable container duration
/// falls back to [`FALLBACK_DURATION_SECS`].
pub fn parse_ffprobe_json(json: &str) -> wf_core::Result<MediaInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| wf_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| wf_core::Error::Probe("no video stream".into()))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(wf_core::Error::Probe(format!(
            "video stream has no usable dimensions ({width}x{height})"
        )));
    }

    let duration = output
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(FALLBACK_DURATION_SECS);

    Ok(MediaInfo::new(width, height, duration))
}
