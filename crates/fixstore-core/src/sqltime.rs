//! Timestamp text as persisted in the `creation_time` and log `time`
//! columns: `YYYY-MM-DD HH:MM:SS`, second resolution. Sub-second
//! precision travels separately as an integer millisecond column.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Timelike, Utc};

pub const SQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_sql_time(t: &DateTime<Utc>) -> String {
    t.format(SQL_TIME_FORMAT).to_string()
}

pub fn parse_sql_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, SQL_TIME_FORMAT).map(|naive| naive.and_utc())
}

/// Split an instant into its second-resolution text and millisecond remainder.
pub fn split_millis(t: &DateTime<Utc>) -> (String, u32) {
    // Leap-second nanos (>= 1e9) still map into 0..=999.
    let millis = (t.nanosecond() / 1_000_000).min(999);
    (format_sql_time(t), millis)
}

/// Drop everything below one second.
pub fn truncate_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_pads_fields() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 7, 8, 9).unwrap();
        assert_eq!(format_sql_time(&t), "2026-01-05 07:08:09");
    }

    #[test]
    fn parse_reads_formatted_value() {
        let t = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(parse_sql_time(&format_sql_time(&t)).unwrap(), t);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_sql_time("yesterday").is_err());
        assert!(parse_sql_time("2026-01-05T07:08:09Z").is_err());
    }

    #[test]
    fn split_carries_millis() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 7, 8, 9).unwrap()
            + chrono::Duration::milliseconds(427);
        let (text, millis) = split_millis(&t);
        assert_eq!(text, "2026-01-05 07:08:09");
        assert_eq!(millis, 427);
    }

    #[test]
    fn truncate_drops_subseconds() {
        let whole = Utc.with_ymd_and_hms(2026, 1, 5, 7, 8, 9).unwrap();
        let t = whole + chrono::Duration::microseconds(999_999);
        assert_eq!(truncate_to_seconds(t), whole);
    }
}
