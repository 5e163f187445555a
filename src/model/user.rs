use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub role_id: u8,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// One roster member as seen by the daily reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct RosterEntry {
    pub id: u64,
    #[serde(rename = "name")]
    pub display_name: String,
}
