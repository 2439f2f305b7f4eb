use axum::Json;
use axum::extract::{Path, State};

use supporttickr_db::models::ConversionRequest;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::services::approval_service::ApprovalUpdateRequest;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> ApiResult<Json<Vec<ConversionRequest>>> {
    Ok(Json(state.approvals.list_pending(&ctx).await?))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<ApprovalUpdateRequest>,
) -> ApiResult<Json<ConversionRequest>> {
    Ok(Json(state.approvals.update(&ctx, &id, req).await?))
}
