use serde::{Deserialize, Serialize};

use super::{AttributeAvailability, Entity, GtfsRouteType, StatusType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub feed_id: String,
    pub gtfs_route_id: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_desc: Option<String>,
    /// reference into the global route type table
    pub route_type_id: Option<String>,
    pub gtfs_route_type: GtfsRouteType,
    pub route_url: Option<String>,
    pub route_color: Option<String>,
    pub route_text_color: Option<String>,
    pub route_branding_url: Option<String>,
    pub comments: Option<String>,
    pub status: StatusType,
    pub publicly_visible: bool,
    /// internal id of the operating agency
    pub agency_id: Option<String>,
    pub wheelchair_boarding: AttributeAvailability,
}

impl Route {
    pub fn new(feed_id: &str, short_name: &str, gtfs_route_type: GtfsRouteType) -> Route {
        Route {
            id: super::new_id(),
            feed_id: feed_id.to_string(),
            gtfs_route_id: None,
            route_short_name: Some(short_name.to_string()),
            route_long_name: None,
            route_desc: None,
            route_type_id: None,
            gtfs_route_type,
            route_url: None,
            route_color: None,
            route_text_color: None,
            route_branding_url: None,
            comments: None,
            status: StatusType::InProgress,
            publicly_visible: false,
            agency_id: None,
            wheelchair_boarding: AttributeAvailability::Unknown,
        }
    }

    /// id written to routes.txt, falling back to the internal id.
    pub fn gtfs_id(&self) -> String {
        match &self.gtfs_route_id {
            Some(gtfs_id) if !gtfs_id.is_empty() => gtfs_id.clone(),
            _ => self.id.clone(),
        }
    }
}

impl Entity for Route {
    const TABLE: &'static str = "routes";

    fn id(&self) -> &str {
        &self.id
    }
}

/// a vehicle type shared across feeds, kept in the global table group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteType {
    pub id: String,
    pub gtfs_route_type: GtfsRouteType,
    pub description: String,
}

impl RouteType {
    pub fn new(gtfs_route_type: GtfsRouteType) -> RouteType {
        RouteType {
            id: super::new_id(),
            gtfs_route_type,
            description: gtfs_route_type.to_string(),
        }
    }
}

impl Entity for RouteType {
    const TABLE: &'static str = "route_types";

    fn id(&self) -> &str {
        &self.id
    }
}
