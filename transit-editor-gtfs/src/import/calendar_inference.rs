use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Months, NaiveDate, Weekday};
use itertools::Itertools;
use transit_editor_core::model::{new_id, ExemplarService, ScheduleException, ServiceCalendar};

use crate::feed::{
    CalendarDateRecord, CalendarRecord, EXCEPTION_TYPE_ADDED, EXCEPTION_TYPE_REMOVED,
};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// copies a calendar.txt row.
pub fn calendar_from_record(feed_id: &str, record: &CalendarRecord) -> ServiceCalendar {
    let mut calendar = ServiceCalendar::new(feed_id, record.start_date, record.end_date);
    calendar.gtfs_service_id = Some(record.service_id.clone());
    calendar.monday = record.monday == 1;
    calendar.tuesday = record.tuesday == 1;
    calendar.wednesday = record.wednesday == 1;
    calendar.thursday = record.thursday == 1;
    calendar.friday = record.friday == 1;
    calendar.saturday = record.saturday == 1;
    calendar.sunday = record.sunday == 1;
    calendar.description = Some(calendar.infer_name());
    calendar
}

/// infers a weekly calendar for a service that only appears in calendar_dates.txt.
///
/// a weekday is active when it has service on at least half (rounded up) as many
/// dates as the busiest weekday. dates removing service are ignored. the validity
/// range spans the first and last service date; a service without any dates runs
/// on no weekday and gets a default range of one year starting one month before
/// `reference_date`.
pub fn infer_calendar(
    feed_id: &str,
    service_id: &str,
    dates: &[&CalendarDateRecord],
    reference_date: NaiveDate,
) -> ServiceCalendar {
    let service_dates = dates
        .iter()
        .filter(|cd| cd.exception_type != EXCEPTION_TYPE_REMOVED)
        .map(|cd| cd.date)
        .collect_vec();

    let mut calendar = match (service_dates.iter().min(), service_dates.iter().max()) {
        (Some(start), Some(end)) => {
            let mut calendar = ServiceCalendar::new(feed_id, *start, *end);
            let counts = service_dates.iter().counts_by(|date| date.weekday());
            let max_service = counts.values().copied().max().unwrap_or_default();
            let threshold = max_service.div_ceil(2);
            for weekday in WEEKDAYS {
                let count = counts.get(&weekday).copied().unwrap_or_default();
                calendar.set_weekday(weekday, count >= threshold);
            }
            calendar
        }
        _ => {
            log::warn!("service {service_id} has no service whatsoever");
            let start = reference_date
                .checked_sub_months(Months::new(1))
                .unwrap_or(reference_date);
            let end = start.checked_add_months(Months::new(12)).unwrap_or(start);
            ServiceCalendar::new(feed_id, start, end)
        }
    };
    calendar.gtfs_service_id = Some(service_id.to_string());
    calendar.description = Some(calendar.infer_name());
    calendar
}

/// turns the calendar_dates.txt rows of services that have a calendar.txt row
/// into swap exceptions, one per date. a date adds the calendars whose rows have
/// exception type 1 and removes those with exception type 2.
///
/// # Arguments
///
/// * `calendar_ids` - internal calendar id by GTFS service id, for the services
///   defined in calendar.txt
pub fn swap_exceptions(
    feed_id: &str,
    calendar_dates: &[CalendarDateRecord],
    calendar_ids: &HashMap<String, String>,
) -> Vec<ScheduleException> {
    let mut by_date: BTreeMap<NaiveDate, (Vec<String>, Vec<String>)> = BTreeMap::new();
    for cd in calendar_dates.iter() {
        let Some(calendar_id) = calendar_ids.get(&cd.service_id) else {
            continue;
        };
        let (added, removed) = by_date.entry(cd.date).or_default();
        match cd.exception_type {
            EXCEPTION_TYPE_ADDED => added.push(calendar_id.clone()),
            EXCEPTION_TYPE_REMOVED => removed.push(calendar_id.clone()),
            other => log::warn!(
                "ignoring calendar date {} for service {} with unknown exception_type {other}",
                cd.date,
                cd.service_id
            ),
        }
    }
    by_date
        .into_iter()
        .filter(|(_, (added, removed))| !added.is_empty() || !removed.is_empty())
        .map(|(date, (added, removed))| ScheduleException {
            id: new_id(),
            feed_id: feed_id.to_string(),
            name: format!("Service change on {date}"),
            dates: vec![date],
            exemplar: ExemplarService::Swap {
                added: added.into_iter().unique().collect(),
                removed: removed.into_iter().unique().collect(),
            },
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn cd(service_id: &str, date: NaiveDate, exception_type: i32) -> CalendarDateRecord {
        CalendarDateRecord {
            service_id: service_id.to_string(),
            date,
            exception_type,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_infer_three_of_four_mondays() {
        // mondays in july 2024: 1, 8, 15, 22. tuesdays: 2, 9, 16, 23
        let rows = vec![
            cd("S", ymd(2024, 7, 1), 1),
            cd("S", ymd(2024, 7, 8), 1),
            cd("S", ymd(2024, 7, 15), 1),
            cd("S", ymd(2024, 7, 22), 2),
            cd("S", ymd(2024, 7, 9), 1),
        ];
        let refs = rows.iter().collect_vec();
        let calendar = infer_calendar("feed", "S", &refs, ymd(2024, 1, 1));
        assert!(calendar.monday);
        assert!(!calendar.tuesday);
        assert!(!calendar.sunday);
        assert_eq!(calendar.start_date, ymd(2024, 7, 1));
        assert_eq!(calendar.end_date, ymd(2024, 7, 15));
        assert_eq!(calendar.gtfs_service_id.as_deref(), Some("S"));
        assert_eq!(calendar.description.as_deref(), Some("Mo"));
    }

    #[test]
    fn test_infer_threshold_rounds_up() {
        // three saturdays and two sundays: threshold ceil(3/2) = 2
        let rows = vec![
            cd("W", ymd(2024, 7, 6), 1),
            cd("W", ymd(2024, 7, 13), 1),
            cd("W", ymd(2024, 7, 20), 1),
            cd("W", ymd(2024, 7, 7), 1),
            cd("W", ymd(2024, 7, 14), 1),
            cd("W", ymd(2024, 7, 10), 1),
        ];
        let refs = rows.iter().collect_vec();
        let calendar = infer_calendar("feed", "W", &refs, ymd(2024, 1, 1));
        assert!(calendar.saturday);
        assert!(calendar.sunday);
        assert!(!calendar.wednesday);
        assert_eq!(calendar.description.as_deref(), Some("SaSu"));
    }

    #[test]
    fn test_infer_without_service() {
        let rows = vec![cd("X", ymd(2024, 7, 1), 2)];
        let refs = rows.iter().collect_vec();
        let calendar = infer_calendar("feed", "X", &refs, ymd(2024, 3, 15));
        assert!(WEEKDAYS.iter().all(|d| !calendar.runs_on_weekday(*d)));
        assert_eq!(calendar.start_date, ymd(2024, 2, 15));
        assert_eq!(calendar.end_date, ymd(2025, 2, 15));
        assert_eq!(calendar.description.as_deref(), Some("X"));
    }

    #[test]
    fn test_swap_exceptions_group_by_date() {
        let ids = HashMap::from([
            (String::from("WK"), String::from("cal-wk")),
            (String::from("SAT"), String::from("cal-sat")),
        ]);
        let rows = vec![
            cd("WK", ymd(2024, 7, 4), 2),
            cd("SAT", ymd(2024, 7, 4), 1),
            cd("WK", ymd(2024, 12, 25), 2),
            cd("INFERRED", ymd(2024, 12, 26), 1),
        ];
        let exceptions = swap_exceptions("feed", &rows, &ids);
        assert_eq!(exceptions.len(), 2);
        assert_eq!(exceptions[0].dates, vec![ymd(2024, 7, 4)]);
        assert_eq!(
            exceptions[0].exemplar,
            ExemplarService::Swap {
                added: vec![String::from("cal-sat")],
                removed: vec![String::from("cal-wk")],
            }
        );
        assert_eq!(exceptions[1].dates, vec![ymd(2024, 12, 25)]);
    }
}
