//! Display helpers for sizes, dates and table cells.

use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};

const SIZE_UNITS: &[&str] = &["bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

const DATE_FORMAT: &str = "%b %d, %Y, %I:%M %p";

/// Human-readable size with 1024-based units, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    // Pick the unit from the displayed value so 1023.999 KB shows as 1 MB
    loop {
        let shown = (value * 100.0).round() / 100.0;
        if shown < 1024.0 || unit == SIZE_UNITS.len() - 1 {
            value = shown;
            break;
        }
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

/// Local-time rendering of a Drive timestamp, `-` when absent
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(dt) => format_timestamp(&dt.with_timezone(&Local)),
        None => "-".to_string(),
    }
}

fn format_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    dt.format(DATE_FORMAT).to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 bytes");
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_048_576), "1 MB");
        assert_eq!(format_bytes(16_106_127_360), "15 GB");
    }

    #[test]
    fn test_format_bytes_rounds_into_next_unit() {
        assert_eq!(format_bytes(1023), "1023 bytes");
        assert_eq!(format_bytes(1_048_575), "1 MB");
        assert_eq!(format_bytes(1_073_741_823), "1 GB");
    }

    #[test]
    fn test_format_timestamp() {
        let dt = Utc.with_ymd_and_hms(2022, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(format_timestamp(&dt), "Mar 01, 2022, 10:30 AM");
        assert_eq!(format_date(None), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
        assert_eq!(truncate("Hi", 2), "Hi");
        assert_eq!(truncate("Résumé final.pdf", 9), "Résumé...");
    }
}
