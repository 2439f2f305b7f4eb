use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const TICKET_STATUSES: [&str; 4] = ["open", "in-progress", "resolved", "closed"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String, // 'open', 'in-progress', 'resolved', 'closed'
    pub priority: String,
    pub category: String,
    pub organization_id: String,
    pub created_by: String,
    pub assigned_to: Option<String>,
    pub hours_worked: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dashboard aggregates over a scope's tickets.
#[derive(Debug, Clone, Default, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
    pub total_hours: f64,
}
