//! ffmpeg filter descriptions for preset renders, still-image clips and the
//! SuperLED composite.

use wf_core::{Padding, Preset};

/// Source and target durations closer than this are not retimed.
pub const RETIME_THRESHOLD_SECS: f64 = 0.5;

/// The `-vf` chain that fits a source into `preset`'s frame.
///
/// Letterbox scales to fit and pads symmetrically, a bar preset scales to the
/// reduced height and fills the band at the bottom, anything else is
/// stretched. A `setpts` rescale is appended when [`retime_factor`] asks for
/// one.
pub fn preset_filter(preset: &Preset, source_duration_secs: f64) -> String {
    let (w, h) = (preset.width, preset.height);
    let mut filter = match preset.padding {
        Padding::Letterbox => format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1"
        ),
        Padding::Bar { size } => {
            let content = h.saturating_sub(size);
            format!("scale={w}:{content},pad={w}:{h}:0:0:color=black,setsar=1")
        }
        Padding::Stretch => format!("scale={w}:{h},setsar=1"),
    };

    if let Some(factor) = retime_factor(preset, source_duration_secs) {
        filter.push_str(&format!(",setpts={factor:.4}*PTS"));
    }
    filter
}

/// `target / source` when the source must be time-stretched to the preset
/// duration, else `None`.
pub fn retime_factor(preset: &Preset, source_duration_secs: f64) -> Option<f64> {
    if preset.use_original_duration
        || !source_duration_secs.is_finite()
        || source_duration_secs <= 0.0
    {
        return None;
    }
    if (source_duration_secs - preset.duration_secs).abs() > RETIME_THRESHOLD_SECS {
        Some(preset.duration_secs / source_duration_secs)
    } else {
        None
    }
}

/// Output length of a preset render.
pub fn render_duration(preset: &Preset, source_duration_secs: f64) -> f64 {
    if preset.use_original_duration && source_duration_secs > 0.0 {
        source_duration_secs
    } else {
        preset.duration_secs
    }
}

/// Filter turning a looped still into a clip at its native size.
pub fn still_clip_filter(width: u32, height: u32) -> String {
    format!("scale={width}:{height},setsar=1")
}

// ---------------------------------------------------------------------------
// SuperLED
// ---------------------------------------------------------------------------

/// Scale one panel clip to the panel resolution.
pub fn panel_scale_filter(width: u32, height: u32) -> String {
    format!("scale={width}:{height},setsar=1")
}

/// `filter_complex` graph that extends or joins the scaled clips of a panel
/// into a single `total_secs` stream labelled `[v]`.
///
/// One clip is frozen on its last frame up to `total_secs`; two clips are
/// each frozen up to half of it and concatenated; three clips are simply
/// concatenated. Returns `None` for any other count.
pub fn panel_assemble_graph(clip_durations: &[f64], total_secs: f64) -> Option<String> {
    let pad = |idx: usize, until: f64, label: &str| {
        let extra = (until - clip_durations[idx]).max(0.0);
        format!("[{idx}:v]tpad=stop_mode=clone:stop_duration={extra:.3}[{label}]")
    };

    match clip_durations.len() {
        1 => Some(pad(0, total_secs, "v")),
        2 => {
            let half = total_secs / 2.0;
            Some(format!(
                "{};{};[v0][v1]concat=n=2:v=1[v]",
                pad(0, half, "v0"),
                pad(1, half, "v1")
            ))
        }
        3 => Some("[0:v][1:v][2:v]concat=n=3:v=1[v]".to_string()),
        _ => None,
    }
}

/// Graph stacking three panels side by side into `[v]`.
pub fn hstack_graph() -> &'static str {
    "[0:v][1:v][2:v]hstack=inputs=3[v]"
}
