use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Storage format for timestamps. Lexical order matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// chrono's %Y also accepts two digits, so the short-year forms go first.
// A four-digit year fails them on the trailing digits.
const DATETIME_FORMATS: [&str; 3] = ["%d.%m.%y %H:%M", "%d.%m.%Y %H:%M", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: [&str; 3] = ["%d.%m.%y", "%d.%m.%Y", "%Y-%m-%d"];

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses the date column of the draw archive. Date-only values are placed at
/// noon, which is when the archive lists undated draws.
pub fn parse_draw_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&raw, fmt) {
            return Some(ts);
        }
    }

    let noon = NaiveTime::from_hms_opt(12, 0, 0)?;
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&raw, fmt) {
            return Some(date.and_time(noon));
        }
    }

    None
}

/// Keeps only the digits of a draw label such as "Тираж № 1234".
/// Returns `None` for labels without digits or for draw number 0.
pub fn parse_draw_number(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<i64>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}

/// Whole minutes of a non-negative delta, as shown in reports.
pub fn delta_minutes(delta: TimeDelta) -> i64 {
    delta.num_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn parses_archive_date_formats() {
        assert_eq!(parse_draw_time("15.01.2024 10:00"), Some(at(2024, 1, 15, 10, 0)));
        assert_eq!(parse_draw_time("15.01.24 22:30"), Some(at(2024, 1, 15, 22, 30)));
        assert_eq!(parse_draw_time("2024-01-15 09:05"), Some(at(2024, 1, 15, 9, 5)));
        assert_eq!(parse_draw_time("  15.01.2024\n 10:00 "), Some(at(2024, 1, 15, 10, 0)));
    }

    #[test]
    fn date_only_values_land_at_noon() {
        assert_eq!(parse_draw_time("15.01.2024"), Some(at(2024, 1, 15, 12, 0)));
        assert_eq!(parse_draw_time("2024-01-15"), Some(at(2024, 1, 15, 12, 0)));
        assert_eq!(parse_draw_time("15.01.24"), Some(at(2024, 1, 15, 12, 0)));
    }

    #[test]
    fn garbage_dates_are_rejected() {
        assert_eq!(parse_draw_time("yesterday"), None);
        assert_eq!(parse_draw_time(""), None);
    }

    #[test]
    fn draw_numbers_keep_digits_only() {
        assert_eq!(parse_draw_number("Тираж № 1234"), Some(1234));
        assert_eq!(parse_draw_number("#0"), None);
        assert_eq!(parse_draw_number("n/a"), None);
    }

    #[test]
    fn timestamps_use_storage_format() {
        assert_eq!(format_timestamp(&at(2024, 1, 5, 7, 3)), "2024-01-05 07:03:00");
    }
}
