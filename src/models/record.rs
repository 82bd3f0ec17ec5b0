use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Media type stored when the API response doesn't name one.
pub const DEFAULT_MEDIA_TYPE: &str = "image";

/// A row of `apod_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub id: i64,
    pub title: String,
    pub explanation: Option<String>,
    pub url: Option<String>,
    pub date: NaiveDate,
    pub media_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Transformed API payload, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDailyRecord {
    pub title: String,
    pub explanation: Option<String>,
    pub url: Option<String>,
    pub date: NaiveDate,
    pub media_type: String,
}
