//! one struct per canonical GTFS file. field names match the GTFS column names.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::gtfs_serde_ops::{
    deserialize_gtfs_date, deserialize_gtfs_time, deserialize_optional_gtfs_date,
    deserialize_optional_gtfs_time, serialize_gtfs_date, serialize_gtfs_time,
    serialize_optional_gtfs_date, serialize_optional_gtfs_time,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyRecord {
    pub agency_id: Option<String>,
    pub agency_name: String,
    #[serde(default)]
    pub agency_url: String,
    pub agency_timezone: String,
    pub agency_lang: Option<String>,
    pub agency_phone: Option<String>,
    pub agency_fare_url: Option<String>,
    pub agency_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    pub stop_code: Option<String>,
    pub stop_name: Option<String>,
    pub stop_desc: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
    pub zone_id: Option<String>,
    pub stop_url: Option<String>,
    pub location_type: Option<i32>,
    pub parent_station: Option<String>,
    pub stop_timezone: Option<String>,
    pub wheelchair_boarding: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub route_id: String,
    pub agency_id: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_desc: Option<String>,
    pub route_type: i32,
    pub route_url: Option<String>,
    pub route_color: Option<String>,
    pub route_text_color: Option<String>,
    pub route_branding_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    pub trip_headsign: Option<String>,
    pub trip_short_name: Option<String>,
    pub direction_id: Option<i32>,
    pub block_id: Option<String>,
    pub shape_id: Option<String>,
    pub wheelchair_accessible: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTimeRecord {
    pub trip_id: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_gtfs_time",
        serialize_with = "serialize_optional_gtfs_time"
    )]
    pub arrival_time: Option<i32>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_gtfs_time",
        serialize_with = "serialize_optional_gtfs_time"
    )]
    pub departure_time: Option<i32>,
    pub stop_id: String,
    pub stop_sequence: u32,
    pub stop_headsign: Option<String>,
    pub pickup_type: Option<i32>,
    pub drop_off_type: Option<i32>,
    pub shape_dist_traveled: Option<f64>,
    pub timepoint: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarRecord {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    #[serde(
        deserialize_with = "deserialize_gtfs_date",
        serialize_with = "serialize_gtfs_date"
    )]
    pub start_date: NaiveDate,
    #[serde(
        deserialize_with = "deserialize_gtfs_date",
        serialize_with = "serialize_gtfs_date"
    )]
    pub end_date: NaiveDate,
}

/// service added on a date
pub const EXCEPTION_TYPE_ADDED: i32 = 1;
/// service removed on a date
pub const EXCEPTION_TYPE_REMOVED: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDateRecord {
    pub service_id: String,
    #[serde(
        deserialize_with = "deserialize_gtfs_date",
        serialize_with = "serialize_gtfs_date"
    )]
    pub date: NaiveDate,
    pub exception_type: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePointRecord {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
    pub shape_dist_traveled: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRecord {
    pub trip_id: String,
    #[serde(
        deserialize_with = "deserialize_gtfs_time",
        serialize_with = "serialize_gtfs_time"
    )]
    pub start_time: i32,
    #[serde(
        deserialize_with = "deserialize_gtfs_time",
        serialize_with = "serialize_gtfs_time"
    )]
    pub end_time: i32,
    pub headway_secs: i32,
    pub exact_times: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareAttributeRecord {
    pub fare_id: String,
    pub price: f64,
    pub currency_type: String,
    pub payment_method: i32,
    /// empty means unlimited transfers
    pub transfers: Option<i32>,
    pub agency_id: Option<String>,
    pub transfer_duration: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareRuleRecord {
    pub fare_id: String,
    pub route_id: Option<String>,
    pub origin_id: Option<String>,
    pub destination_id: Option<String>,
    pub contains_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedInfoRecord {
    pub feed_publisher_name: Option<String>,
    pub feed_publisher_url: Option<String>,
    pub feed_lang: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_gtfs_date",
        serialize_with = "serialize_optional_gtfs_date"
    )]
    pub feed_start_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_gtfs_date",
        serialize_with = "serialize_optional_gtfs_date"
    )]
    pub feed_end_date: Option<NaiveDate>,
    pub feed_version: Option<String>,
}
