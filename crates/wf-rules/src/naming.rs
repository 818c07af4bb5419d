//! Output naming: signage-format tags and base names.
//!
//! A rendered preset is matched against an ordered [`NamingTable`] of known
//! (width, height, whole seconds, bar) formats. The first matching row gives
//! the tag; unmatched presets get a descriptive `UNDEFINED_...` tag.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use wf_core::Preset;

/// Label used when the client label is empty.
pub const DEFAULT_CLIENT_LABEL: &str = "C";

/// `DDMMYYYY`, the date prefix of every output name.
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%d%m%Y").to_string()
}

/// One row of the naming table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRule {
    pub width: u32,
    pub height: u32,
    /// Whole seconds (preset duration is rounded before comparing).
    pub duration_secs: u32,
    /// `Some(b)` also requires the preset's bar flag to equal `b`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_bar: Option<bool>,
    pub tag: String,
}

impl FormatRule {
    fn new(width: u32, height: u32, duration_secs: u32, tag: &str) -> Self {
        Self {
            width,
            height,
            duration_secs,
            apply_bar: None,
            tag: tag.to_string(),
        }
    }

    fn with_bar(mut self, bar: bool) -> Self {
        self.apply_bar = Some(bar);
        self
    }

    /// Whether this row describes `preset`.
    pub fn matches(&self, preset: &Preset) -> bool {
        self.width == preset.width
            && self.height == preset.height
            && Some(self.duration_secs) == whole_seconds(preset.duration_secs)
            && self
                .apply_bar
                .map_or(true, |bar| bar == preset.apply_bar)
    }
}

fn whole_seconds(secs: f64) -> Option<u32> {
    let rounded = secs.round();
    if rounded.is_finite() && rounded >= 0.0 && rounded <= f64::from(u32::MAX) {
        Some(rounded as u32)
    } else {
        None
    }
}

/// Ordered first-match table of known signage formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingTable {
    rules: Vec<FormatRule>,
}

impl Default for NamingTable {
    fn default() -> Self {
        Self::new(vec![
            FormatRule::new(1920, 1080, 10, "WIDEFULLHD"),
            FormatRule::new(1280, 720, 10, "WIDE"),
            FormatRule::new(1280, 720, 15, "TER"),
            FormatRule::new(800, 600, 10, "BOX"),
            FormatRule::new(1080, 1920, 10, "VERTFULLHD").with_bar(true),
            FormatRule::new(1080, 1920, 10, "MUP").with_bar(false),
            FormatRule::new(608, 1080, 10, "VERT"),
            FormatRule::new(2048, 720, 10, "MUB-FOR-SP"),
            FormatRule::new(864, 288, 10, "LED4"),
            FormatRule::new(960, 1344, 10, "TOTEMG"),
            FormatRule::new(1920, 540, 10, "WALL"),
            FormatRule::new(3360, 240, 10, "LED"),
            FormatRule::new(3648, 1152, 30, "SUPERLED"),
        ])
    }
}

impl NamingTable {
    pub fn new(rules: Vec<FormatRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FormatRule] {
        &self.rules
    }

    /// Tag of the first matching row, if any.
    pub fn find_tag(&self, preset: &Preset) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(preset))
            .map(|rule| rule.tag.as_str())
    }

    /// Tag for `preset`, falling back to `UNDEFINED_{w}x{h}_{s}s`.
    pub fn tag(&self, preset: &Preset) -> String {
        match self.find_tag(preset) {
            Some(tag) => tag.to_string(),
            None => format!(
                "UNDEFINED_{}x{}_{}s",
                preset.width,
                preset.height,
                preset.duration_secs.round()
            ),
        }
    }

    /// `{date}_{tag}_{client}`, without extension.
    pub fn base_name(&self, preset: &Preset, client_label: &str, date_stamp: &str) -> String {
        let client = client_label.trim();
        let client = if client.is_empty() {
            DEFAULT_CLIENT_LABEL
        } else {
            client
        };
        format!("{date_stamp}_{}_{client}", self.tag(preset))
    }
}
