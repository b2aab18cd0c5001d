//! Time utilities for proctord
//!
//! Frame timestamps are wall-clock `DateTime<Local>` values stamped by the
//! capture side. Dwell timers are computed from the difference between two
//! frame timestamps, never from the daemon's own clock, so replaying a
//! recorded session yields the same decisions.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `PROCTOR_MOCK_TIME` environment variable overrides the
//! daemon's notion of "now" (used for audit records and session start times).
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "PROCTOR_MOCK_TIME";

/// Format accepted by `PROCTOR_MOCK_TIME`
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let mock_time_str = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT)
            else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    expected_format = MOCK_TIME_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };
            let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    "Failed to convert mock time to local timezone"
                );
                return None;
            };
            let offset = mock_dt.signed_duration_since(chrono::Local::now());
            tracing::info!(
                mock_time = %mock_time_str,
                offset_secs = offset.num_seconds(),
                "Mock time enabled"
            );
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// ISO-8601 timestamp truncated to whole seconds, e.g. `2025-12-25T14:30:00+01:00`.
pub fn format_timestamp_secs(dt: &DateTime<Local>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Seconds elapsed from `earlier` to `later`, clamped at zero.
pub fn elapsed_secs(earlier: &DateTime<Local>, later: &DateTime<Local>) -> f64 {
    let delta = later.signed_duration_since(*earlier);
    match delta.num_microseconds() {
        Some(us) => (us as f64 / 1_000_000.0).max(0.0),
        None => (delta.num_milliseconds() as f64 / 1000.0).max(0.0),
    }
}

/// Round to two decimal places (the precision used in termination summaries).
pub fn round_centis(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 25, h, m, s).unwrap()
    }

    #[test]
    fn timestamp_has_second_precision() {
        let dt = at(14, 30, 45) + chrono::Duration::milliseconds(789);
        let formatted = format_timestamp_secs(&dt);
        assert!(formatted.starts_with("2025-12-25T14:30:45"));
        assert!(!formatted.contains(".789"));
    }

    #[test]
    fn elapsed_is_fractional() {
        let start = at(10, 0, 0);
        let later = start + chrono::Duration::milliseconds(1500);
        assert!((elapsed_secs(&start, &later) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn elapsed_never_negative() {
        let start = at(10, 0, 5);
        let earlier = at(10, 0, 0);
        assert_eq!(elapsed_secs(&start, &earlier), 0.0);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_centis(5.126), 5.13);
        assert_eq!(round_centis(0.0), 0.0);
    }

    #[test]
    fn mock_time_format_parses() {
        assert!(NaiveDateTime::parse_from_str("2025-12-25 14:30:00", MOCK_TIME_FORMAT).is_ok());
        assert!(NaiveDateTime::parse_from_str("2025-12-25T14:30:00", MOCK_TIME_FORMAT).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn mock_time_check_does_not_panic() {
        let _ = is_mock_time_active();
    }
}
