// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a BSON datetime the same way.
pub fn format_bson_rfc3339(date: bson::DateTime) -> String {
    format_utc_rfc3339(date.to_chrono())
}

/// Current time as a BSON datetime.
pub fn bson_now() -> bson::DateTime {
    bson::DateTime::from_chrono(Utc::now())
}

/// Parse a client-supplied timestamp.
///
/// Accepts RFC3339 as well as the naive `YYYY-MM-DDTHH:MM[:SS[.f]]` and
/// `YYYY-MM-DD HH:MM:SS` forms that browser date pickers produce; naive
/// values are taken as UTC.
pub fn parse_client_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_client_datetime_forms() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();

        assert_eq!(parse_client_datetime("2026-03-14T09:30:00Z"), Some(expected));
        assert_eq!(
            parse_client_datetime("2026-03-14T11:30:00+02:00"),
            Some(expected)
        );
        assert_eq!(parse_client_datetime("2026-03-14T09:30"), Some(expected));
        assert_eq!(parse_client_datetime("2026-03-14 09:30:00"), Some(expected));
        assert_eq!(
            parse_client_datetime("2026-03-14T09:30:00.000"),
            Some(expected)
        );
        assert_eq!(parse_client_datetime("next tuesday"), None);
    }

    #[test]
    fn test_format_bson_rfc3339() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            format_bson_rfc3339(bson::DateTime::from_chrono(dt)),
            "2026-01-02T03:04:05Z"
        );
    }
}
