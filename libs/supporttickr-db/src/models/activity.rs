use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only audit entry, also backing the dashboard feed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String, // e.g. 'ticket-created', 'conversion-approved'
    pub description: String,
    pub user_id: String,
    pub ticket_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
