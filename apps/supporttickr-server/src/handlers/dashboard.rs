use axum::Json;
use axum::extract::State;

use supporttickr_db::models::ActivityItem;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::services::dashboard_service::DashboardStats;
use crate::state::AppState;

pub async fn stats(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.dashboard.stats(&ctx).await?))
}

pub async fn activities(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> ApiResult<Json<Vec<ActivityItem>>> {
    Ok(Json(state.dashboard.activities(&ctx).await?))
}
