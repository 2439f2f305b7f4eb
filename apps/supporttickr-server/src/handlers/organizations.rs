use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use supporttickr_db::models::Organization;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::services::org_service::{CreateOrgRequest, UpdateOrgRequest};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> ApiResult<Json<Vec<Organization>>> {
    Ok(Json(state.orgs.list(&ctx).await?))
}

pub async fn get(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Organization>> {
    Ok(Json(state.orgs.get(&ctx, &id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<CreateOrgRequest>,
) -> ApiResult<(StatusCode, Json<Organization>)> {
    let org = state.orgs.create(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrgRequest>,
) -> ApiResult<Json<Organization>> {
    Ok(Json(state.orgs.update(&ctx, &id, req).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.orgs.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
