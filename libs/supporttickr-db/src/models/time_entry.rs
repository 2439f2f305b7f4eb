use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only work log. Each entry's hours are added to the parent ticket's
/// `hours_worked` as part of the same store operation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub ticket_id: String,
    pub user_id: String,
    pub hours: f64,
    pub description: String,
    #[serde(rename = "date")]
    pub entry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}
