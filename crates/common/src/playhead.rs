//! Playhead time helpers.
//!
//! Mask windows and playback positions are plain `f64` seconds. These
//! helpers keep the clamping and `m:ss` rendering consistent between the
//! editor, the CLI, and log output.

/// Clamp a playhead position into `[0, duration]`.
///
/// Non-finite positions collapse to `0.0`. A non-positive or non-finite
/// duration leaves only the lower bound in force.
pub fn clamp_playhead(secs: f64, duration_secs: f64) -> f64 {
    if !secs.is_finite() {
        return 0.0;
    }
    let secs = secs.max(0.0);
    if duration_secs.is_finite() && duration_secs > 0.0 {
        secs.min(duration_secs)
    } else {
        secs
    }
}

/// Render seconds as `m:ss`, truncating fractional seconds.
pub fn format_playhead(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Render seconds with millisecond precision for logs (`12.345s`).
pub fn format_secs(secs: f64) -> String {
    format!("{secs:.3}s")
}
