pub mod activity_service;
pub mod approval_service;
pub mod dashboard_service;
pub mod invoice_service;
pub mod org_service;
pub mod ticket_service;
pub mod user_service;

use uuid::Uuid;

/// Short prefixed id, e.g. `msg-1a2b3c4d`.
pub fn short_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..8])
}
