use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Entity;

/// feed-level metadata kept in the global table group, one record per feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorFeed {
    pub id: String,
    pub feed_publisher_name: Option<String>,
    pub feed_publisher_url: Option<String>,
    pub feed_lang: Option<String>,
    pub feed_start_date: Option<NaiveDate>,
    pub feed_end_date: Option<NaiveDate>,
    pub feed_version: Option<String>,
    /// map center used when editing, taken from the stop extent at import
    pub default_lat: Option<f64>,
    pub default_lon: Option<f64>,
}

impl EditorFeed {
    pub fn new(id: &str) -> EditorFeed {
        EditorFeed {
            id: id.to_string(),
            feed_publisher_name: None,
            feed_publisher_url: None,
            feed_lang: None,
            feed_start_date: None,
            feed_end_date: None,
            feed_version: None,
            default_lat: None,
            default_lon: None,
        }
    }
}

impl Entity for EditorFeed {
    const TABLE: &'static str = "feeds";

    fn id(&self) -> &str {
        &self.id
    }
}
