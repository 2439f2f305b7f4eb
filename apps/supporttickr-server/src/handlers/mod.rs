pub mod approvals;
pub mod dashboard;
pub mod invoices;
pub mod organizations;
pub mod tickets;
pub mod users;

use axum::Json;
use serde_json::{Value, json};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
