use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Dual-track category reclassification request. Both approval fields start at
/// 'pending'; the ticket's category is overwritten once both read 'approved'.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub id: String,
    pub ticket_id: String,
    pub proposed_type: String,
    pub reason: String,
    pub internal_approval: String, // 'pending', 'approved', 'rejected'
    pub client_approval: String,
    pub proposed_by: String,
    pub created_at: DateTime<Utc>,
}

impl ConversionRequest {
    pub fn is_fully_approved(&self) -> bool {
        self.internal_approval == APPROVED && self.client_approval == APPROVED
    }

    pub fn is_pending(&self) -> bool {
        self.internal_approval == PENDING || self.client_approval == PENDING
    }
}

pub const PENDING: &str = "pending";
pub const APPROVED: &str = "approved";
pub const REJECTED: &str = "rejected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalSide {
    Internal,
    Client,
}

impl ApprovalSide {
    pub fn parse(s: &str) -> Option<ApprovalSide> {
        match s {
            "internal" => Some(ApprovalSide::Internal),
            "client" => Some(ApprovalSide::Client),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalSide::Internal => "internal",
            ApprovalSide::Client => "client",
        }
    }
}
