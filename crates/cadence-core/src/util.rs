//! Shared utility functions used across multiple modules.

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Last representable millisecond of the UTC calendar day containing `instant`.
///
/// Due dates and the due query both cut off here, so "due today" does not
/// depend on the time of day a query runs.
pub fn end_of_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    let last_millisecond =
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    instant.date_naive().and_time(last_millisecond).and_utc()
}

/// End of the calendar day `days` after the day containing `instant`.
pub fn due_after_days(instant: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    end_of_day(instant + Duration::days(i64::from(days)))
}

/// Fractional days elapsed from `from` to `to` (negative when `to` is earlier).
#[allow(clippy::cast_precision_loss)] // millisecond counts stay far below 2^52
pub fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 86_400_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn end_of_day_is_stable_across_time_of_day() {
        let morning = Utc.with_ymd_and_hms(2026, 3, 14, 6, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2026, 3, 14, 23, 30, 0).unwrap();
        assert_eq!(end_of_day(morning), end_of_day(night));
        assert_eq!(
            end_of_day(morning).to_rfc3339(),
            "2026-03-14T23:59:59.999+00:00"
        );
    }

    #[test]
    fn due_after_days_crosses_month_boundary() {
        let start = Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap();
        let due = due_after_days(start, 3);
        assert_eq!(due.date_naive().to_string(), "2026-02-02");
    }

    #[test]
    fn elapsed_days_is_fractional_and_signed() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = start + Duration::hours(36);
        assert!((elapsed_days(start, later) - 1.5).abs() < 1e-9);
        assert!(elapsed_days(later, start) < 0.0);
    }
}
