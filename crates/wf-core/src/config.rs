//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool, queue and encoder sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// x264 speed presets accepted by `-preset`.
pub const X264_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub queue: QueueConfig,
    pub encoder: EncoderSettings,
    /// Presets JSON file. `None` means the built-in catalogue only.
    pub presets_path: Option<PathBuf>,
    /// Client label used in output names when none is given.
    pub default_client_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            queue: QueueConfig::default(),
            encoder: EncoderSettings::default(),
            presets_path: None,
            default_client_label: "C".into(),
        }
    }
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration strictly: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.queue.concurrency == 0 {
            warnings.push("queue.concurrency is 0; 1 worker will be used".into());
        }

        if self.queue.archive_dir_name.trim().is_empty() {
            warnings.push("queue.archive_dir_name is empty; originals would stay in place".into());
        }

        if !(self.queue.image_clip_secs.is_finite() && self.queue.image_clip_secs > 0.0) {
            warnings.push(format!(
                "queue.image_clip_secs must be positive (got {})",
                self.queue.image_clip_secs
            ));
        }

        if self.encoder.quality_factor > 51 {
            warnings.push(format!(
                "encoder.quality_factor {} is outside the x264 range 0..=51",
                self.encoder.quality_factor
            ));
        }

        if !X264_PRESETS.contains(&self.encoder.preset_name.as_str()) {
            warnings.push(format!(
                "encoder.preset_name '{}' is not a recognized x264 preset (valid: {})",
                self.encoder.preset_name,
                X264_PRESETS.join(", ")
            ));
        }

        if self.default_client_label.trim().is_empty() {
            warnings.push("default_client_label is empty; \"C\" will be used".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// External tool path overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Scheduler and working-directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of sources processed at once.
    pub concurrency: usize,
    /// Directory (next to the originals) that receives archived sources.
    pub archive_dir_name: String,
    /// Prefix of the per-batch scratch directory.
    pub scratch_prefix: String,
    /// Length of the clip synthesized from a still image.
    pub image_clip_secs: f64,
    /// Kill the running render when the batch is cancelled.
    pub kill_on_cancel: bool,
    /// Container extension of rendered outputs.
    pub output_extension: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            archive_dir_name: "Antigos".into(),
            scratch_prefix: ".wallforge-temp".into(),
            image_clip_secs: 10.0,
            kill_on_cancel: false,
            output_extension: "mp4".into(),
        }
    }
}

impl QueueConfig {
    /// Concurrency clamped to at least one worker.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Encoder knobs passed through to every render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// x264 `-preset` value.
    pub preset_name: String,
    /// x264 `-crf` value.
    pub quality_factor: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            preset_name: "fast".into(),
            quality_factor: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.queue.concurrency, 2);
        assert_eq!(cfg.queue.archive_dir_name, "Antigos");
        assert_eq!(cfg.queue.image_clip_secs, 10.0);
        assert!(!cfg.queue.kill_on_cancel);
        assert_eq!(cfg.encoder.preset_name, "fast");
        assert_eq!(cfg.encoder.quality_factor, 25);
        assert_eq!(cfg.default_client_label, "C");
    }

    #[test]
    fn default_config_no_warnings() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn zero_concurrency_warns_and_clamps() {
        let mut cfg = Config::default();
        cfg.queue.concurrency = 0;
        assert!(cfg.validate().iter().any(|w| w.contains("concurrency")));
        assert_eq!(cfg.queue.effective_concurrency(), 1);
    }

    #[test]
    fn bad_encoder_settings_warn() {
        let mut cfg = Config::default();
        cfg.encoder.quality_factor = 60;
        cfg.encoder.preset_name = "warp".into();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("quality_factor")));
        assert!(warnings.iter().any(|w| w.contains("warp")));
    }

    #[test]
    fn bad_queue_settings_warn() {
        let mut cfg = Config::default();
        cfg.queue.archive_dir_name = " ".into();
        cfg.queue.image_clip_secs = 0.0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("archive_dir_name")));
        assert!(warnings.iter().any(|w| w.contains("image_clip_secs")));
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"queue": {"concurrency": 4}, "encoder": {"quality_factor": 18}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.queue.concurrency, 4);
        assert_eq!(cfg.queue.archive_dir_name, "Antigos");
        assert_eq!(cfg.encoder.quality_factor, 18);
        assert_eq!(cfg.encoder.preset_name, "fast");
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.queue.concurrency, 2);
        assert!(cfg.presets_path.is_none());
    }

    #[test]
    fn parse_invalid_json_is_validation_error() {
        let err = Config::from_json("{ nope").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_none() {
        let cfg = Config::load_or_default(None);
        assert_eq!(cfg.queue.concurrency, 2);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/wallforge.json")));
        assert_eq!(cfg.encoder.quality_factor, 25);
    }

    #[test]
    fn load_or_default_with_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        let cfg = Config::load_or_default(Some(&path));
        assert_eq!(cfg.queue.concurrency, 2);
    }

    #[test]
    fn load_is_strict() {
        assert!(Config::load(Path::new("/nonexistent/wallforge.json")).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tools": {"ffmpeg_path": "/opt/ffmpeg"}}"#).unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.tools.ffmpeg_path, Some(PathBuf::from("/opt/ffmpeg")));
    }
}
