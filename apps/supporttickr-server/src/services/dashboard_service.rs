use std::sync::Arc;

use serde::Serialize;

use supporttickr_db::EntityStore;
use supporttickr_db::models::{ActivityItem, TicketStats};

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::scope::Scope;
use crate::services::activity_service::ActivityService;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(flatten)]
    pub tickets: TicketStats,
    pub pending_approvals: i64,
    pub avg_response_time: &'static str,
}

pub struct DashboardService {
    store: Arc<dyn EntityStore>,
    activity: Arc<ActivityService>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn EntityStore>, activity: Arc<ActivityService>) -> DashboardService {
        DashboardService { store, activity }
    }

    pub async fn stats(&self, ctx: &AuthContext) -> ApiResult<DashboardStats> {
        let scope = Scope::of(ctx);
        let tickets = self.store.ticket_stats(scope.org_filter()).await?;
        let pending_approvals = self.store.count_pending_approvals(scope.org_filter()).await?;
        Ok(DashboardStats {
            tickets,
            pending_approvals,
            // TODO: derive from first-response timestamps once messages carry
            // an author-role marker in the stats query.
            avg_response_time: "2.4h",
        })
    }

    pub async fn activities(&self, ctx: &AuthContext) -> ApiResult<Vec<ActivityItem>> {
        self.activity.recent(ctx).await
    }
}
