use std::sync::Arc;

use chrono::Utc;
use supporttickr_db::EntityStore;
use supporttickr_db::models::ActivityItem;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::scope::Scope;
use crate::services::short_id;

const FEED_LIMIT: i64 = 50;

pub struct ActivityService {
    store: Arc<dyn EntityStore>,
}

impl ActivityService {
    pub fn new(store: Arc<dyn EntityStore>) -> ActivityService {
        ActivityService { store }
    }

    /// Best-effort append. The audit trail must never fail the operation it
    /// describes, so storage errors are logged and swallowed here.
    pub async fn record(
        &self,
        kind: &str,
        description: String,
        user_id: &str,
        ticket_id: Option<&str>,
    ) {
        let item = ActivityItem {
            id: short_id("act"),
            kind: kind.to_string(),
            description,
            user_id: user_id.to_string(),
            ticket_id: ticket_id.map(Into::into),
            created_at: Utc::now(),
        };
        if let Err(err) = self.store.append_activity(&item).await {
            tracing::warn!(kind = %item.kind, "failed to append activity: {err}");
        }
    }

    /// Newest-first feed for the caller's scope. A client sees entries whose
    /// ticket belongs to their organization plus non-ticket entries.
    pub async fn recent(&self, ctx: &AuthContext) -> ApiResult<Vec<ActivityItem>> {
        let scope = Scope::of(ctx);
        Ok(self
            .store
            .list_activities(scope.org_filter(), FEED_LIMIT)
            .await?)
    }
}
