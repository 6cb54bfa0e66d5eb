//! Conversions between absolute playback time, timeline percentage and the
//! clock strings shown next to the scrubber. Every other module goes through
//! these so clamping and rounding stay consistent.

/// Position of `time` on a timeline of `duration` seconds, in `[0, 100]`.
///
/// A non-positive (or NaN) duration maps everything to 0.
pub fn time_to_percent(time: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || time.is_nan() {
        return 0.0;
    }

    (time / duration * 100.0).clamp(0.0, 100.0)
}

/// Inverse of [`time_to_percent`]: the time at `percent` of `duration`.
pub fn percent_to_time(percent: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || percent.is_nan() {
        return 0.0;
    }

    percent.clamp(0.0, 100.0) / 100.0 * duration
}

/// Formats seconds as `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
