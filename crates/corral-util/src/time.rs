//! Time utilities for corral
//!
//! Process identity uses the OS-reported start time of the PID, expressed
//! as whole seconds since the Unix epoch. Wall-clock helpers here are for
//! display only and never feed identity decisions.

use chrono::{DateTime, Local, TimeZone};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as whole seconds since the Unix epoch
pub fn epoch_secs_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Render an epoch-seconds timestamp as local `YYYY-MM-DD HH:MM:SS`
pub fn format_epoch_secs(secs: u64) -> String {
    match Local.timestamp_opt(secs as i64, 0) {
        chrono::LocalResult::Single(dt) => format_datetime(&dt),
        _ => format!("@{}", secs),
    }
}

/// Format a DateTime for display with full date and time
pub fn format_datetime(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Uptime of a process whose start fingerprint is `start_secs`,
/// saturating to zero if the clock has gone backwards.
pub fn uptime_since(start_secs: u64) -> Duration {
    Duration::from_secs(epoch_secs_now().saturating_sub(start_secs))
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn epoch_now_is_reasonable() {
        // After 2020-01-01, before 2100-01-01
        let now = epoch_secs_now();
        assert!(now > 1_577_836_800);
        assert!(now < 4_102_444_800);
    }

    #[test]
    fn uptime_saturates() {
        let future = epoch_secs_now() + 3600;
        assert_eq!(uptime_since(future), Duration::ZERO);
    }

    #[test]
    fn format_epoch_secs_is_stable() {
        // 2026-01-01 00:00:00 UTC; exact local rendering depends on TZ,
        // but it must parse back out as a date-time string.
        let s = format_epoch_secs(1_767_225_600);
        assert_eq!(s.len(), 19);
        assert!(s.contains('-') && s.contains(':'));
    }
}
