/// Utility functions for timestamps and value formatting
use std::sync::OnceLock;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Resolve the local UTC offset once
///
/// Must first be called while the process is still single-threaded; the
/// offset cannot be queried soundly afterwards. Falls back to UTC.
pub fn local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// Current wall-clock time in the local offset
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// Format a timestamp for the CSV log and telemetry form
///
/// Produces MM/DD/YY HH:MM:SS. Falls back to the default string
/// representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!(
        "[month]/[day]/[year repr:last_two] [hour]:[minute]:[second]"
    );
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Format the clock time (HH:MM) shown next to the chart
pub fn format_clock(dt: &OffsetDateTime) -> String {
    let format = format_description!("[hour]:[minute]");
    dt.format(&format).unwrap_or_else(|_| dt.time().to_string())
}

/// Seconds since the Unix epoch as a float, for linear time axes
pub fn epoch_seconds(dt: &OffsetDateTime) -> f64 {
    dt.unix_timestamp() as f64 + dt.nanosecond() as f64 / 1_000_000_000.0
}

/// Round to three decimal places, as readings are written to the log
pub fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

/// Rounded to three decimals, always with a decimal point (`20.0`, `21.235`)
pub fn format_decimal(value: f32) -> String {
    let rounded = round3(value);
    if rounded.is_finite() && rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        rounded.to_string()
    }
}
