use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub plan: String, // 'starter', 'business', 'enterprise'
    pub contact_email: String,
    pub created_at: DateTime<Utc>,
}
