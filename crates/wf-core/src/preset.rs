//! Output presets: the persisted record shape and the normalized form the
//! engine works with.
//!
//! [`PresetRecord`] mirrors the JSON file on disk (camelCase, optional
//! fields). [`PresetRecord::normalize`] validates it once and fills every
//! default, so nothing downstream ever reads an optional field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::Error;

/// Aspect-ratio tolerance used when a record does not specify one.
pub const DEFAULT_RATIO_TOLERANCE: f64 = 0.2;

// ---------------------------------------------------------------------------
// PresetRecord
// ---------------------------------------------------------------------------

/// A preset exactly as stored in the presets file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Target duration in seconds.
    pub duration: f64,
    #[serde(default)]
    pub apply_bar: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar_size: Option<u32>,
    #[serde(default)]
    pub letterbox: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio_tolerance: Option<f64>,
    #[serde(default)]
    pub use_original_duration: bool,
}

impl PresetRecord {
    /// Validate and fill defaults, producing the engine-facing [`Preset`].
    pub fn normalize(&self) -> Result<Preset> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(Error::Validation("preset id must not be empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Validation(format!(
                "preset {id}: width and height must be positive (got {}x{})",
                self.width, self.height
            )));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(Error::Validation(format!(
                "preset {id}: duration must be positive (got {})",
                self.duration
            )));
        }

        let ratio_tolerance = self.ratio_tolerance.unwrap_or(DEFAULT_RATIO_TOLERANCE);
        if !(ratio_tolerance.is_finite() && ratio_tolerance >= 0.0) {
            return Err(Error::Validation(format!(
                "preset {id}: ratioTolerance must be a non-negative number"
            )));
        }

        let padding = if self.letterbox {
            if self.apply_bar {
                tracing::warn!(preset = %id, "letterbox and applyBar both set; using letterbox");
            }
            Padding::Letterbox
        } else if self.apply_bar {
            let size = self.bar_size.unwrap_or(0);
            if size >= self.height {
                return Err(Error::Validation(format!(
                    "preset {id}: barSize {size} leaves no room in height {}",
                    self.height
                )));
            }
            Padding::Bar { size }
        } else {
            Padding::Stretch
        };

        let name = if self.name.trim().is_empty() {
            id.to_string()
        } else {
            self.name.clone()
        };

        Ok(Preset {
            id: id.to_string(),
            name,
            width: self.width,
            height: self.height,
            duration_secs: self.duration,
            padding,
            apply_bar: self.apply_bar,
            ratio_tolerance,
            use_original_duration: self.use_original_duration,
        })
    }
}

/// The built-in catalogue written on first run.
pub fn default_records() -> Vec<PresetRecord> {
    let bar = |id: &str, name: &str, width, height| PresetRecord {
        id: id.into(),
        name: name.into(),
        width,
        height,
        duration: 10.0,
        apply_bar: true,
        bar_size: Some(75),
        letterbox: false,
        ratio_tolerance: None,
        use_original_duration: false,
    };
    vec![
        bar("WFHD", "WIDEFULLHD", 1920, 1080),
        bar("WIDE", "WIDE", 1280, 720),
        bar("VFHD", "VERTFULLHD", 1080, 1920),
    ]
}

// ---------------------------------------------------------------------------
// Preset
// ---------------------------------------------------------------------------

/// How content is fitted into the preset frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Padding {
    /// Scale straight to the target size, ignoring aspect ratio.
    Stretch,
    /// Scale to fit and pad symmetrically.
    Letterbox,
    /// Scale to `height - size` and fill a solid band at the bottom.
    Bar { size: u32 },
}

/// A validated preset with every default resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    pub padding: Padding,
    /// The stored `applyBar` flag. Naming keys on it even when letterbox
    /// wins for rendering.
    pub apply_bar: bool,
    pub ratio_tolerance: f64,
    pub use_original_duration: bool,
}

impl Preset {
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Convert back to the on-disk shape.
    pub fn to_record(&self) -> PresetRecord {
        let (bar_size, letterbox) = match self.padding {
            Padding::Stretch => (None, false),
            Padding::Letterbox => (None, true),
            Padding::Bar { size } => (Some(size), false),
        };
        PresetRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            duration: self.duration_secs,
            apply_bar: self.apply_bar,
            bar_size,
            letterbox,
            ratio_tolerance: Some(self.ratio_tolerance),
            use_original_duration: self.use_original_duration,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{} {}s)",
            self.id, self.width, self.height, self.duration_secs
        )
    }
}

/// Normalize a list of records, failing on the first invalid one.
pub fn normalize_all(records: &[PresetRecord]) -> Result<Vec<Preset>> {
    records.iter().map(PresetRecord::normalize).collect()
}

// ---------------------------------------------------------------------------
// PresetStore
// ---------------------------------------------------------------------------

/// Load and save the presets JSON file.
pub struct PresetStore;

impl PresetStore {
    /// Read the presets file, writing the built-in defaults if it does not
    /// exist yet. A file that cannot be parsed yields the defaults.
    pub fn load_or_init(path: &Path) -> Result<Vec<PresetRecord>> {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Vec<PresetRecord>>(&contents) {
                Ok(records) => Ok(records),
                Err(e) => {
                    tracing::warn!("Failed to parse presets file {}: {e}", path.display());
                    Ok(default_records())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = default_records();
                Self::save(path, &defaults)?;
                tracing::info!("Wrote default presets to {}", path.display());
                Ok(defaults)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write records as pretty-printed JSON, creating parent directories.
    pub fn save(path: &Path, records: &[PresetRecord]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| Error::Internal(format!("preset serialization failed: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
