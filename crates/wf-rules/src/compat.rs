//! Preset compatibility.

use wf_core::{MediaInfo, Preset};

/// Maximum source/preset duration gap, in seconds.
pub const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// Whether `preset` may be applied to a source with the probed `info`.
///
/// Requires both an aspect ratio within `preset.ratio_tolerance` and, unless
/// the preset keeps the original duration, a duration within
/// [`DURATION_TOLERANCE_SECS`]. Missing info or a zero-height source is never
/// compatible.
pub fn is_compatible(info: Option<&MediaInfo>, preset: &Preset) -> bool {
    let Some(info) = info else {
        return false;
    };
    let Some(source_ratio) = info.aspect_ratio() else {
        return false;
    };

    let ratio_ok = (source_ratio - preset.aspect_ratio()).abs() <= preset.ratio_tolerance;
    let duration_ok = preset.use_original_duration
        || (info.duration_secs - preset.duration_secs).abs() <= DURATION_TOLERANCE_SECS;

    ratio_ok && duration_ok
}

/// The presets compatible with `info`, in their original order.
pub fn compatible_presets<'a>(info: Option<&MediaInfo>, presets: &'a [Preset]) -> Vec<&'a Preset> {
    presets.iter().filter(|p| is_compatible(info, p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_core::PresetRecord;

    struct P {
        w: u32,
        h: u32,
        d: f64,
        tol: Option<f64>,
        original: bool,
    }

    fn preset(p: P) -> Preset {
        PresetRecord {
            id: format!("{}x{}", p.w, p.h),
            name: String::new(),
            width: p.w,
            height: p.h,
            duration: p.d,
            apply_bar: false,
            bar_size: None,
            letterbox: false,
            ratio_tolerance: p.tol,
            use_original_duration: p.original,
        }
        .normalize()
        .unwrap()
    }

    fn plain(w: u32, h: u32, d: f64) -> Preset {
        preset(P { w, h, d, tol: None, original: false })
    }

    const WIDE: MediaInfo = MediaInfo { width: 1920, height: 1080, duration_secs: 10.0 };
    const TALL: MediaInfo = MediaInfo { width: 1080, height: 1920, duration_secs: 15.0 };

    #[test]
    fn exact_match() {
        assert!(is_compatible(Some(&WIDE), &plain(1920, 1080, 10.0)));
    }

    #[test]
    fn ratio_within_default_tolerance() {
        assert!(is_compatible(Some(&WIDE), &plain(2000, 1080, 10.0)));
    }

    #[test]
    fn square_preset_rejected() {
        assert!(!is_compatible(Some(&WIDE), &plain(1080, 1080, 10.0)));
    }

    #[test]
    fn custom_tolerance_rejects_near_match() {
        // 1950/1080 - 1920/1080 = 0.0278 > 0.01
        let p = preset(P { w: 1950, h: 1080, d: 10.0, tol: Some(0.01), original: false });
        assert!(!is_compatible(Some(&WIDE), &p));
    }

    #[test]
    fn custom_tolerance_is_inclusive_of_small_gaps() {
        // 1930/1080 - 1920/1080 = 0.0093 <= 0.01
        let p = preset(P { w: 1930, h: 1080, d: 10.0, tol: Some(0.01), original: false });
        assert!(is_compatible(Some(&WIDE), &p));

        let tighter = preset(P { w: 1930, h: 1080, d: 10.0, tol: Some(0.005), original: false });
        assert!(!is_compatible(Some(&WIDE), &tighter));
    }

    #[test]
    fn duration_window() {
        assert!(is_compatible(Some(&WIDE), &plain(1920, 1080, 11.5)));
        assert!(is_compatible(Some(&WIDE), &plain(1920, 1080, 12.0)));
        assert!(!is_compatible(Some(&WIDE), &plain(1920, 1080, 13.0)));
    }

    #[test]
    fn original_duration_ignores_gap() {
        let p = preset(P { w: 1080, h: 1920, d: 5.0, tol: None, original: true });
        assert!(is_compatible(Some(&TALL), &p));
    }

    #[test]
    fn vertical_sources() {
        assert!(is_compatible(Some(&TALL), &plain(1080, 1920, 15.0)));
        assert!(!is_compatible(Some(&TALL), &plain(1920, 1080, 15.0)));
    }

    #[test]
    fn missing_info_never_compatible() {
        assert!(!is_compatible(None, &plain(1920, 1080, 10.0)));
    }

    #[test]
    fn zero_height_source_never_compatible() {
        let broken = MediaInfo::new(1920, 0, 10.0);
        assert!(!is_compatible(Some(&broken), &plain(1920, 1080, 10.0)));
    }

    #[test]
    fn agrees_with_closed_form() {
        let presets = [
            plain(1920, 1080, 10.0),
            plain(1280, 720, 15.0),
            plain(800, 600, 10.0),
            plain(1080, 1920, 10.0),
            plain(3360, 240, 10.0),
            preset(P { w: 864, h: 288, d: 10.0, tol: Some(0.5), original: false }),
            preset(P { w: 608, h: 1080, d: 3.0, tol: Some(0.05), original: true }),
        ];
        let infos = [
            MediaInfo::new(1920, 1080, 10.0),
            MediaInfo::new(1280, 720, 14.0),
            MediaInfo::new(1024, 768, 9.0),
            MediaInfo::new(720, 1280, 30.0),
            MediaInfo::new(2560, 864, 10.0),
        ];
        for info in &infos {
            for p in &presets {
                let r = f64::from(info.width) / f64::from(info.height);
                let expected = (r - p.aspect_ratio()).abs() <= p.ratio_tolerance
                    && (p.use_original_duration || (info.duration_secs - p.duration_secs).abs() <= 2.0);
                assert_eq!(is_compatible(Some(info), p), expected, "{info} vs {p}");
            }
        }
    }

    #[test]
    fn compatible_presets_keeps_order() {
        let presets = vec![plain(1920, 1080, 10.0), plain(1080, 1080, 10.0), plain(1280, 720, 10.0)];
        let ids: Vec<&str> = compatible_presets(Some(&WIDE), &presets)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1920x1080", "1280x720"]);
    }
}
