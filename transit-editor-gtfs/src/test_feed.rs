//! a small GTFS feed built in code for pipeline tests.
use chrono::NaiveDate;

use crate::feed::*;

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stop(id: &str, lat: Option<f64>, location_type: Option<i32>, parent: Option<&str>) -> StopRecord {
    StopRecord {
        stop_id: id.to_string(),
        stop_code: None,
        stop_name: Some(format!("Stop {id}")),
        stop_desc: None,
        stop_lat: lat,
        stop_lon: lat.map(|_| -105.0),
        zone_id: None,
        stop_url: None,
        location_type,
        parent_station: parent.map(String::from),
        stop_timezone: None,
        wheelchair_boarding: None,
    }
}

fn route(id: &str, agency_id: Option<&str>, route_type: i32) -> RouteRecord {
    RouteRecord {
        route_id: id.to_string(),
        agency_id: agency_id.map(String::from),
        route_short_name: Some(id.to_string()),
        route_long_name: None,
        route_desc: None,
        route_type,
        route_url: None,
        route_color: None,
        route_text_color: None,
        route_branding_url: None,
    }
}

fn trip(id: &str, route_id: &str, service_id: &str, shape_id: Option<&str>) -> TripRecord {
    TripRecord {
        route_id: route_id.to_string(),
        service_id: service_id.to_string(),
        trip_id: id.to_string(),
        trip_headsign: Some(String::from("Downtown")),
        trip_short_name: None,
        direction_id: Some(0),
        block_id: None,
        shape_id: shape_id.map(String::from),
        wheelchair_accessible: None,
    }
}

fn stop_times(trip_id: &str, stops: &[(&str, Option<i32>)]) -> Vec<StopTimeRecord> {
    stops
        .iter()
        .enumerate()
        .map(|(i, (stop_id, time))| StopTimeRecord {
            trip_id: trip_id.to_string(),
            arrival_time: *time,
            departure_time: *time,
            stop_id: stop_id.to_string(),
            stop_sequence: (i as u32 + 1) * 10,
            stop_headsign: None,
            pickup_type: None,
            drop_off_type: None,
            shape_dist_traveled: None,
            timepoint: None,
        })
        .collect()
}

fn calendar_date(service_id: &str, date: NaiveDate, exception_type: i32) -> CalendarDateRecord {
    CalendarDateRecord {
        service_id: service_id.to_string(),
        date,
        exception_type,
    }
}

const H7: i32 = 7 * 3600;

/// one agency, two routes and five trips:
/// * T1 and T2 run S1-S4 on R1 and share a pattern
/// * T3 runs S1-S3 on R1
/// * T4 runs S1-S4 on R2, a different route with the same stops
/// * T5 runs S1-S4 on R1 by frequency
///
/// service WK comes from calendar.txt with a holiday on 2024-07-04, service SAT
/// only from calendar_dates.txt.
pub fn sample_feed() -> FeedTables {
    let full = |trip_id: &str, offset: i32| {
        stop_times(
            trip_id,
            &[
                ("S1", Some(H7 + offset)),
                ("S2", None),
                ("S3", Some(H7 + offset + 600)),
                ("S4", Some(H7 + offset + 900)),
            ],
        )
    };
    let mut all_stop_times = vec![];
    all_stop_times.extend(full("T1", 0));
    all_stop_times.extend(full("T2", 3600));
    all_stop_times.extend(stop_times(
        "T3",
        &[("S1", Some(H7)), ("S2", Some(H7 + 300)), ("S3", Some(H7 + 600))],
    ));
    all_stop_times.extend(full("T4", 0));
    all_stop_times.extend(full("T5", -H7));

    FeedTables {
        agencies: vec![AgencyRecord {
            agency_id: Some(String::from("A1")),
            agency_name: String::from("Metro"),
            agency_url: String::from("http://metro.example"),
            agency_timezone: String::from("America/Denver"),
            agency_lang: None,
            agency_phone: None,
            agency_fare_url: None,
            agency_email: None,
        }],
        stops: vec![
            stop("S1", Some(40.00), None, None),
            stop("S2", Some(40.01), None, None),
            stop("S3", Some(40.02), None, None),
            stop("S4", Some(40.03), None, Some("ST1")),
            stop("ST1", Some(40.03), Some(1), None),
            stop("E1", None, Some(2), Some("ST1")),
        ],
        routes: vec![route("R1", Some("A1"), 3), route("R2", None, 0)],
        trips: vec![
            trip("T1", "R1", "WK", Some("SH1")),
            trip("T2", "R1", "WK", Some("SH1")),
            trip("T3", "R1", "SAT", None),
            trip("T4", "R2", "WK", None),
            trip("T5", "R1", "WK", None),
        ],
        stop_times: all_stop_times,
        calendars: vec![CalendarRecord {
            service_id: String::from("WK"),
            monday: 1,
            tuesday: 1,
            wednesday: 1,
            thursday: 1,
            friday: 1,
            saturday: 0,
            sunday: 0,
            start_date: ymd(2024, 1, 1),
            end_date: ymd(2024, 12, 31),
        }],
        calendar_dates: vec![
            calendar_date("WK", ymd(2024, 7, 4), EXCEPTION_TYPE_REMOVED),
            calendar_date("SAT", ymd(2024, 7, 6), EXCEPTION_TYPE_ADDED),
            calendar_date("SAT", ymd(2024, 7, 13), EXCEPTION_TYPE_ADDED),
            calendar_date("SAT", ymd(2024, 7, 20), EXCEPTION_TYPE_ADDED),
        ],
        shapes: (0..4)
            .map(|i| ShapePointRecord {
                shape_id: String::from("SH1"),
                shape_pt_lat: 40.0 + 0.01 * i as f64,
                shape_pt_lon: -105.0001,
                shape_pt_sequence: i + 1,
                shape_dist_traveled: None,
            })
            .collect(),
        frequencies: vec![FrequencyRecord {
            trip_id: String::from("T5"),
            start_time: 6 * 3600,
            end_time: 9 * 3600,
            headway_secs: 600,
            exact_times: None,
        }],
        fare_attributes: vec![FareAttributeRecord {
            fare_id: String::from("F1"),
            price: 2.5,
            currency_type: String::from("USD"),
            payment_method: 0,
            transfers: None,
            agency_id: Some(String::from("A1")),
            transfer_duration: None,
        }],
        fare_rules: vec![FareRuleRecord {
            fare_id: String::from("F1"),
            route_id: Some(String::from("R1")),
            origin_id: None,
            destination_id: None,
            contains_id: None,
        }],
        feed_info: vec![FeedInfoRecord {
            feed_publisher_name: Some(String::from("Metro")),
            feed_publisher_url: Some(String::from("http://metro.example")),
            feed_lang: Some(String::from("en")),
            feed_start_date: Some(ymd(2024, 1, 1)),
            feed_end_date: Some(ymd(2024, 12, 31)),
            feed_version: Some(String::from("v1")),
        }],
    }
}
