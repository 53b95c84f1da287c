use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// approval state of a route. only approved routes are published on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusType {
    #[default]
    InProgress,
    PendingApproval,
    Approved,
    Disabled,
}

impl Display for StatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusType::InProgress => "IN_PROGRESS",
            StatusType::PendingApproval => "PENDING_APPROVAL",
            StatusType::Approved => "APPROVED",
            StatusType::Disabled => "DISABLED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for StatusType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "IN_PROGRESS" => Ok(StatusType::InProgress),
            "PENDING_APPROVAL" => Ok(StatusType::PendingApproval),
            "APPROVED" => Ok(StatusType::Approved),
            "DISABLED" => Ok(StatusType::Disabled),
            other => Err(format!("unknown route status '{other}'")),
        }
    }
}

/// tri-state accessibility flag shared by stops, routes and trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeAvailability {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl AttributeAvailability {
    pub fn from_gtfs(value: Option<i32>) -> AttributeAvailability {
        match value {
            Some(1) => AttributeAvailability::Available,
            Some(2) => AttributeAvailability::Unavailable,
            _ => AttributeAvailability::Unknown,
        }
    }

    pub fn to_gtfs(&self) -> i32 {
        match self {
            AttributeAvailability::Unknown => 0,
            AttributeAvailability::Available => 1,
            AttributeAvailability::Unavailable => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PickupDropOffType {
    #[default]
    Scheduled,
    None,
    ContactAgency,
    CoordinateWithDriver,
}

impl PickupDropOffType {
    pub fn from_gtfs(value: i32) -> Option<PickupDropOffType> {
        match value {
            0 => Some(PickupDropOffType::Scheduled),
            1 => Some(PickupDropOffType::None),
            2 => Some(PickupDropOffType::ContactAgency),
            3 => Some(PickupDropOffType::CoordinateWithDriver),
            _ => None,
        }
    }

    pub fn to_gtfs(&self) -> i32 {
        match self {
            PickupDropOffType::Scheduled => 0,
            PickupDropOffType::None => 1,
            PickupDropOffType::ContactAgency => 2,
            PickupDropOffType::CoordinateWithDriver => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    #[default]
    Stop,
    Station,
    Entrance,
    GenericNode,
    BoardingArea,
}

impl LocationType {
    pub fn from_gtfs(value: Option<i32>) -> LocationType {
        match value {
            Some(1) => LocationType::Station,
            Some(2) => LocationType::Entrance,
            Some(3) => LocationType::GenericNode,
            Some(4) => LocationType::BoardingArea,
            _ => LocationType::Stop,
        }
    }

    pub fn to_gtfs(&self) -> i32 {
        match self {
            LocationType::Stop => 0,
            LocationType::Station => 1,
            LocationType::Entrance => 2,
            LocationType::GenericNode => 3,
            LocationType::BoardingArea => 4,
        }
    }
}

/// direction of travel for patterns and trips, written as GTFS direction_id 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripDirection {
    A,
    B,
}

impl TripDirection {
    pub fn from_gtfs(value: Option<i32>) -> Option<TripDirection> {
        match value {
            Some(0) => Some(TripDirection::A),
            Some(1) => Some(TripDirection::B),
            _ => None,
        }
    }

    pub fn to_gtfs(&self) -> i32 {
        match self {
            TripDirection::A => 0,
            TripDirection::B => 1,
        }
    }
}

/// GTFS route_type codes, including the basic set and anything from the
/// extended (hierarchical vehicle type) range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GtfsRouteType {
    Tram,
    Subway,
    Rail,
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Funicular,
    Trolleybus,
    Monorail,
    Extended(i32),
}

impl GtfsRouteType {
    pub fn from_gtfs(code: i32) -> GtfsRouteType {
        match code {
            0 => GtfsRouteType::Tram,
            1 => GtfsRouteType::Subway,
            2 => GtfsRouteType::Rail,
            3 => GtfsRouteType::Bus,
            4 => GtfsRouteType::Ferry,
            5 => GtfsRouteType::CableTram,
            6 => GtfsRouteType::AerialLift,
            7 => GtfsRouteType::Funicular,
            11 => GtfsRouteType::Trolleybus,
            12 => GtfsRouteType::Monorail,
            other => GtfsRouteType::Extended(other),
        }
    }

    pub fn to_gtfs(&self) -> i32 {
        match self {
            GtfsRouteType::Tram => 0,
            GtfsRouteType::Subway => 1,
            GtfsRouteType::Rail => 2,
            GtfsRouteType::Bus => 3,
            GtfsRouteType::Ferry => 4,
            GtfsRouteType::CableTram => 5,
            GtfsRouteType::AerialLift => 6,
            GtfsRouteType::Funicular => 7,
            GtfsRouteType::Trolleybus => 11,
            GtfsRouteType::Monorail => 12,
            GtfsRouteType::Extended(code) => *code,
        }
    }
}

impl Display for GtfsRouteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GtfsRouteType::Extended(code) => write!(f, "extended route type {code}"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_type_codes() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 11, 12, 700, 1501] {
            assert_eq!(GtfsRouteType::from_gtfs(code).to_gtfs(), code);
        }
        assert_eq!(GtfsRouteType::from_gtfs(700), GtfsRouteType::Extended(700));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "approved".parse::<StatusType>(),
            Ok(StatusType::Approved)
        );
        assert_eq!(
            "pending-approval".parse::<StatusType>(),
            Ok(StatusType::PendingApproval)
        );
        assert!("published".parse::<StatusType>().is_err());
    }
}
