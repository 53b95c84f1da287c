use serde::{Deserialize, Serialize};

use super::Entity;

/// an operating agency within a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub id: String,
    pub feed_id: String,
    /// GTFS agency_id. may be absent for single-agency feeds.
    pub gtfs_agency_id: Option<String>,
    pub name: String,
    pub url: Option<String>,
    pub timezone: String,
    pub lang: Option<String>,
    pub phone: Option<String>,
    pub fare_url: Option<String>,
    pub email: Option<String>,
}

impl Entity for Agency {
    const TABLE: &'static str = "agencies";

    fn id(&self) -> &str {
        &self.id
    }
}
