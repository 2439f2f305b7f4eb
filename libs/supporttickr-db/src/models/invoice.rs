use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const INVOICE_STATUSES: [&str; 3] = ["draft", "sent", "paid"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub organization_id: String,
    pub month: i32,
    pub year: i32,
    pub tickets_closed: i32,
    pub total_hours: f64,
    pub rate_per_hour: f64,
    pub total_amount: f64,
    pub status: String, // 'draft', 'sent', 'paid'
    pub created_at: DateTime<Utc>,
}
