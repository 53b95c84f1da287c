use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::{Entity, ServiceCalendar};

/// describes which service runs on the dates of a [`ScheduleException`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExemplarService {
    /// run calendars as though the date were this weekday
    Weekday { weekday: Weekday },
    /// no calendar runs
    NoService,
    /// exactly the listed calendars run
    Custom { calendar_ids: BTreeSet<String> },
    /// added calendars run, removed calendars do not, others are unaffected
    Swap {
        added: Vec<String>,
        removed: Vec<String>,
    },
}

/// a set of dates with non-standard service, such as holidays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleException {
    pub id: String,
    pub feed_id: String,
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub exemplar: ExemplarService,
}

impl ScheduleException {
    /// whether the given calendar runs on `date`, one of this exception's dates.
    pub fn service_runs_on(&self, calendar: &ServiceCalendar, date: &NaiveDate) -> bool {
        match &self.exemplar {
            ExemplarService::Weekday { weekday } => calendar.runs_on_weekday(*weekday),
            ExemplarService::NoService => false,
            ExemplarService::Custom { calendar_ids } => calendar_ids.contains(&calendar.id),
            ExemplarService::Swap { added, removed } => {
                if added.contains(&calendar.id) {
                    true
                } else if removed.contains(&calendar.id) {
                    false
                } else {
                    calendar.runs_on_weekday(date.weekday())
                }
            }
        }
    }

    /// whether this exception should be written as a calendar date for the calendar.
    /// swaps only affect the calendars they name.
    pub fn applies_to(&self, calendar: &ServiceCalendar) -> bool {
        match &self.exemplar {
            ExemplarService::Swap { added, removed } => {
                added.contains(&calendar.id) || removed.contains(&calendar.id)
            }
            _ => true,
        }
    }

    /// calendar ids this exception refers to by id
    pub fn referenced_calendars(&self) -> Vec<&str> {
        match &self.exemplar {
            ExemplarService::Weekday { .. } | ExemplarService::NoService => vec![],
            ExemplarService::Custom { calendar_ids } => {
                calendar_ids.iter().map(|s| s.as_str()).collect()
            }
            ExemplarService::Swap { added, removed } => added
                .iter()
                .chain(removed.iter())
                .map(|s| s.as_str())
                .collect(),
        }
    }
}

impl Entity for ScheduleException {
    const TABLE: &'static str = "exceptions";

    fn id(&self) -> &str {
        &self.id
    }
}
