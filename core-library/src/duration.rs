//! Track and album duration formatting.
//!
//! Durations of an hour or more render as `H:MM:SS`, shorter ones as `M:SS`.
//! Negative and non-finite inputs clamp to zero and fractional seconds are
//! truncated, so `59.9` renders as `0:59`.

const SECONDS_PER_HOUR: u64 = 3600;

/// Format a duration given in seconds.
///
/// ```
/// use core_library::duration::format_duration;
///
/// assert_eq!(format_duration(125.0), "2:05");
/// assert_eq!(format_duration(3723.0), "1:02:03");
/// assert_eq!(format_duration(-5.0), "0:00");
/// ```
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / SECONDS_PER_HOUR;
    let minutes = (total % SECONDS_PER_HOUR) / 60;
    let secs = total % 60;

    if total >= SECONDS_PER_HOUR {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Format a duration given in milliseconds, as stored on tracks and albums.
pub fn format_duration_ms(duration_ms: i64) -> String {
    format_duration(duration_ms as f64 / 1000.0)
}
