use serde::{Deserialize, Serialize};

use super::Entity;

/// a fare attribute together with the rules that apply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fare {
    pub id: String,
    pub feed_id: String,
    pub gtfs_fare_id: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency_type: String,
    pub payment_method: i32,
    /// number of transfers permitted. `None` means unlimited.
    pub transfers: Option<i32>,
    pub transfer_duration: Option<i32>,
    pub agency_id: Option<String>,
    pub fare_rules: Vec<FareRule>,
}

/// ids in a fare rule are GTFS ids (route_id, zone_id), not internal ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareRule {
    pub route_id: Option<String>,
    pub origin_id: Option<String>,
    pub destination_id: Option<String>,
    pub contains_id: Option<String>,
}

impl Entity for Fare {
    const TABLE: &'static str = "fares";

    fn id(&self) -> &str {
        &self.id
    }
}
