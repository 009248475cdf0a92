//! Naive local date and time-of-day handling. Times travel as zero-padded `HH:MM`
//! strings so lexicographic and chronological order agree; the store may hand
//! back `HH:MM:SS`, which is accepted on input.

use chrono::{Local, NaiveDate, NaiveTime};

/// The server's local calendar date. Bookability and generation windows
/// are measured from here.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
}

pub fn format_time(time: &NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Minutes between two times of day, negative when `end` precedes `start`.
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    (end - start).num_minutes()
}

pub mod hh_mm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_time(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw)
            .map_err(|_| de::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }
}
