use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use supporttickr_db::models::User;

use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::services::user_service::{CreateUserRequest, UpdateUserRequest};
use crate::state::AppState;

/// Wire view of a user. The stored credential hash never leaves the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub organization_id: Option<String>,
    pub avatar: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> UserResponse {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            organization_id: user.organization_id,
            avatar: user.avatar,
        }
    }
}

pub async fn list(State(state): State<AppState>, ctx: AuthContext) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.users.list(&ctx).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(state.users.get(&ctx, &id).await?.into()))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = state.users.create(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    Ok(Json(state.users.update(&ctx, &id, req).await?.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.users.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
