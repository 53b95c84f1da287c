//! serde helpers for the GTFS date (`YYYYMMDD`) and time (`H:MM:SS`) formats.
//! times are stored as seconds after midnight and may run past 24:00:00.
use chrono::NaiveDate;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub const GTFS_DATE_FORMAT: &str = "%Y%m%d";

pub fn parse_gtfs_date(date_str: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(date_str.trim(), GTFS_DATE_FORMAT)
        .map_err(|e| format!("invalid GTFS date '{date_str}': {e}"))
}

pub fn format_gtfs_date(date: &NaiveDate) -> String {
    date.format(GTFS_DATE_FORMAT).to_string()
}

/// parses `H:MM:SS` or `HH:MM:SS` into seconds after midnight.
pub fn parse_gtfs_time(time_str: &str) -> Result<i32, String> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(format!("invalid GTFS time '{time_str}', expected HH:MM:SS"));
    };
    let parse = |v: &str| {
        v.parse::<i32>()
            .map_err(|e| format!("invalid GTFS time '{time_str}': {e}"))
    };
    let (h, m, s) = (parse(*h)?, parse(*m)?, parse(*s)?);
    if h < 0 || !(0..60).contains(&m) || !(0..60).contains(&s) {
        return Err(format!("invalid GTFS time '{time_str}'"));
    }
    Ok(h * 3600 + m * 60 + s)
}

pub fn format_gtfs_time(seconds: i32) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn deserialize_gtfs_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let date_str: String = String::deserialize(deserializer)?;
    parse_gtfs_date(&date_str).map_err(D::Error::custom)
}

pub fn serialize_gtfs_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_gtfs_date(date))
}

pub fn deserialize_optional_gtfs_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(date_str) if !date_str.trim().is_empty() => {
            parse_gtfs_date(&date_str).map(Some).map_err(D::Error::custom)
        }
        _ => Ok(None),
    }
}

pub fn serialize_optional_gtfs_date<S>(
    date: &Option<NaiveDate>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(date) => serializer.serialize_str(&format_gtfs_date(date)),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize_gtfs_time<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let time_str: String = String::deserialize(deserializer)?;
    parse_gtfs_time(&time_str).map_err(D::Error::custom)
}

pub fn serialize_gtfs_time<S>(seconds: &i32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_gtfs_time(*seconds))
}

pub fn deserialize_optional_gtfs_time<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(time_str) if !time_str.trim().is_empty() => {
            parse_gtfs_time(&time_str).map(Some).map_err(D::Error::custom)
        }
        _ => Ok(None),
    }
}

pub fn serialize_optional_gtfs_time<S>(
    seconds: &Option<i32>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match seconds {
        Some(seconds) => serializer.serialize_str(&format_gtfs_time(*seconds)),
        None => serializer.serialize_none(),
    }
}
