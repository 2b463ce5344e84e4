//! DateTime parsing and human-readable duration helpers.

use chrono::{DateTime, Duration, Utc};

/// Parses an RFC3339 timestamp string, returning an error if parsing fails.
///
/// # Examples
///
/// ```
/// use raconteur_domain::common::parse_datetime;
/// use chrono::Datelike;
///
/// let dt = parse_datetime("2024-01-15T10:30:00Z").unwrap();
/// assert_eq!(dt.year(), 2024);
/// ```
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Renders an elapsed duration the way a person would say it ("3 minutes", "an hour").
///
/// Days are counted whole, so anything under 48 hours past the first day is "a day".
/// Months are 30.5 days long and years 365.
pub fn natural_delta(delta: Duration) -> String {
    let total = delta.num_seconds().unsigned_abs();
    let days = total / 86_400;
    let seconds = total % 86_400;
    let years = days / 365;
    let days = days % 365;
    let months = days * 2 / 61;
    let plural = |n: u64, unit: &str| {
        if n == 1 {
            format!("{n} {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };

    match (years, days) {
        (0, 0) => match seconds {
            0 => "a moment".to_string(),
            1 => "a second".to_string(),
            2..=59 => plural(seconds, "second"),
            60..=119 => "a minute".to_string(),
            120..=3_599 => plural(seconds / 60, "minute"),
            3_600..=7_199 => "an hour".to_string(),
            _ => plural(seconds / 3_600, "hour"),
        },
        (0, 1) => "a day".to_string(),
        (0, _) => match months {
            0 => plural(days, "day"),
            1 => "a month".to_string(),
            _ => plural(months, "month"),
        },
        (1, 0) => "a year".to_string(),
        (1, _) if months == 0 => format!("1 year, {}", plural(days, "day")),
        (1, _) => format!("1 year, {}", plural(months, "month")),
        _ => plural(years, "year"),
    }
}

/// Formats a movement cooldown: minutes and seconds above 59 seconds, seconds only below.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let minutes = total / 60;
    let seconds = total % 60;
    let unit = |n: i64, word: &str| {
        if n == 1 {
            format!("{n} {word}")
        } else {
            format!("{n} {word}s")
        }
    };

    if total > 59 {
        format!("{} and {}", unit(minutes, "minute"), unit(seconds, "second"))
    } else {
        unit(seconds, "second")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parse_datetime_reads_rfc3339() {
        let parsed = parse_datetime("2024-01-15T10:30:00+02:00").expect("valid");
        assert_eq!(parsed.hour(), 8);
        assert!(parse_datetime("garbage").is_err());
    }

    #[test]
    fn natural_delta_picks_the_largest_unit() {
        assert_eq!(natural_delta(Duration::seconds(42)), "42 seconds");
        assert_eq!(natural_delta(Duration::minutes(25)), "25 minutes");
        assert_eq!(natural_delta(Duration::hours(5)), "5 hours");
        assert_eq!(natural_delta(Duration::days(6)), "6 days");
        assert_eq!(natural_delta(Duration::minutes(-25)), "25 minutes");
    }

    #[test]
    fn natural_delta_unit_boundaries() {
        let cases = [
            (Duration::seconds(0), "a moment"),
            (Duration::seconds(1), "a second"),
            (Duration::seconds(2), "2 seconds"),
            (Duration::seconds(59), "59 seconds"),
            (Duration::seconds(60), "a minute"),
            (Duration::seconds(119), "a minute"),
            (Duration::seconds(120), "2 minutes"),
            (Duration::seconds(3_599), "59 minutes"),
            (Duration::seconds(3_600), "an hour"),
            (Duration::seconds(7_199), "an hour"),
            (Duration::seconds(7_200), "2 hours"),
            (Duration::seconds(86_399), "23 hours"),
            (Duration::days(1), "a day"),
            (Duration::hours(47), "a day"),
            (Duration::days(2), "2 days"),
            (Duration::days(30), "30 days"),
            (Duration::days(31), "a month"),
            (Duration::days(60), "a month"),
            (Duration::days(61), "2 months"),
            (Duration::days(364), "11 months"),
            (Duration::days(365), "a year"),
            (Duration::days(366), "1 year, 1 day"),
            (Duration::days(395), "1 year, 30 days"),
            (Duration::days(396), "1 year, 1 month"),
            (Duration::days(426), "1 year, 2 months"),
            (Duration::days(730), "2 years"),
            (Duration::days(3_650), "10 years"),
        ];
        for (delta, expected) in cases {
            assert_eq!(natural_delta(delta), expected, "{delta}");
        }
    }

    #[test]
    fn format_remaining_uses_minutes_only_past_a_minute() {
        assert_eq!(format_remaining(Duration::seconds(1)), "1 second");
        assert_eq!(format_remaining(Duration::seconds(59)), "59 seconds");
        assert_eq!(
            format_remaining(Duration::seconds(61)),
            "1 minute and 1 second"
        );
        assert_eq!(
            format_remaining(Duration::seconds(300)),
            "5 minutes and 0 seconds"
        );
    }
}
