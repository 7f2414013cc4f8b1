//! Reusable formatting helpers for CLI output

use chrono::{DateTime, Local};

/// Epoch milliseconds as local `YYYY-MM-DD HH:MM`, or "unknown".
pub fn format_timestamp_ms(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Age in milliseconds as a short duration.
///
/// # Example output
/// `42s`, `3m 10s`, `2h 5m`
pub fn format_age(age_ms: u64) -> String {
    let secs = age_ms / 1000;
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 1 -> "1st", 2 -> "2nd", 11 -> "11th", 23 -> "23rd"
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_ms_valid() {
        // Jan 15, 2025 12:00:00 UTC; exact output depends on local TZ
        let result = format_timestamp_ms(1_736_942_400_000);
        assert!(result.starts_with("2025-01-1"));
    }

    #[test]
    fn test_format_timestamp_ms_out_of_range() {
        assert_eq!(format_timestamp_ms(i64::MAX), "unknown");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(400), "0s");
        assert_eq!(format_age(45_000), "45s");
        assert_eq!(format_age(190_000), "3m 10s");
        assert_eq!(format_age(7_500_000), "2h 5m");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(113), "113th");
    }
}
