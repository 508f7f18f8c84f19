//! Calendar helpers shared by the scheduling cells.
//!
//! Slots are stored as a `YYYY-MM-DD` date and an `HH:MM` time so that slot
//! identity is plain string equality in every store backend.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD", raw))
}

/// Accepts `HH:MM` or `HH:MM:SS`; seconds must be zero.
pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    let time = NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("Invalid time '{}': expected HH:MM", raw))?;

    if time.second() != 0 || time.nanosecond() != 0 {
        return Err(format!("Invalid time '{}': must fall on a whole minute", raw));
    }

    Ok(time)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

/// Slot start in UTC.
pub fn slot_start(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

pub fn is_in_future(date: NaiveDate, time: NaiveTime) -> bool {
    slot_start(date, time) > Utc::now().naive_utc()
}

/// Serde adapter writing `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Window {
        #[serde(with = "hhmm")]
        start: NaiveTime,
    }

    #[test]
    fn parses_short_and_long_times() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time("09:30:00").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(parse_time("09:30:15").is_err());
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("ten").is_err());
    }

    #[test]
    fn parses_dates() {
        assert_eq!(parse_date("2030-03-01").unwrap(), NaiveDate::from_ymd_opt(2030, 3, 1).unwrap());
        assert!(parse_date("2030-02-30").is_err());
        assert!(parse_date("01/03/2030").is_err());
    }

    #[test]
    fn weekday_index_starts_on_sunday() {
        // 2030-03-03 is a Sunday
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2030, 3, 3).unwrap()), 0);
        assert_eq!(day_of_week(NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()), 1);
    }

    #[test]
    fn past_slots_are_not_in_future() {
        let past = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let future = NaiveDate::from_ymd_opt(2999, 1, 1).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(!is_in_future(past, ten));
        assert!(is_in_future(future, ten));
    }

    #[test]
    fn hhmm_serde_drops_seconds() {
        let json = serde_json::to_string(&Window { start: NaiveTime::from_hms_opt(8, 5, 0).unwrap() }).unwrap();
        assert_eq!(json, r#"{"start":"08:05"}"#);

        let back: Window = serde_json::from_str(r#"{"start":"17:45:00"}"#).unwrap();
        assert_eq!(back.start, NaiveTime::from_hms_opt(17, 45, 0).unwrap());
    }
}
