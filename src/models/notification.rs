use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub title: String,
    pub link: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
