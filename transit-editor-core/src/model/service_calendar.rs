use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::Entity;

/// weekly service pattern over a validity date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCalendar {
    pub id: String,
    pub feed_id: String,
    pub gtfs_service_id: Option<String>,
    pub description: Option<String>,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ServiceCalendar {
    pub fn new(feed_id: &str, start_date: NaiveDate, end_date: NaiveDate) -> ServiceCalendar {
        ServiceCalendar {
            id: super::new_id(),
            feed_id: feed_id.to_string(),
            gtfs_service_id: None,
            description: None,
            monday: false,
            tuesday: false,
            wednesday: false,
            thursday: false,
            friday: false,
            saturday: false,
            sunday: false,
            start_date,
            end_date,
        }
    }

    pub fn runs_on_weekday(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }

    pub fn set_weekday(&mut self, weekday: Weekday, active: bool) {
        match weekday {
            Weekday::Mon => self.monday = active,
            Weekday::Tue => self.tuesday = active,
            Weekday::Wed => self.wednesday = active,
            Weekday::Thu => self.thursday = active,
            Weekday::Fri => self.friday = active,
            Weekday::Sat => self.saturday = active,
            Weekday::Sun => self.sunday = active,
        }
    }

    /// true if the date falls within the validity range (inclusive)
    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.start_date <= *date && *date <= self.end_date
    }

    /// weekly service on a date, ignoring any schedule exceptions.
    pub fn runs_on(&self, date: &NaiveDate) -> bool {
        self.contains(date) && self.runs_on_weekday(date.weekday())
    }

    /// short name built from the active weekdays, such as "MoTuWe". calendars
    /// with no active day are named after their GTFS service id.
    pub fn infer_name(&self) -> String {
        let abbreviations = [
            (Weekday::Mon, "Mo"),
            (Weekday::Tue, "Tu"),
            (Weekday::Wed, "We"),
            (Weekday::Thu, "Th"),
            (Weekday::Fri, "Fr"),
            (Weekday::Sat, "Sa"),
            (Weekday::Sun, "Su"),
        ];
        let name: String = abbreviations
            .iter()
            .filter(|(day, _)| self.runs_on_weekday(*day))
            .map(|(_, abbr)| *abbr)
            .collect();
        if name.is_empty() {
            self.gtfs_service_id.clone().unwrap_or_default()
        } else {
            name
        }
    }
}

impl Entity for ServiceCalendar {
    const TABLE: &'static str = "calendars";

    fn id(&self) -> &str {
        &self.id
    }
}
