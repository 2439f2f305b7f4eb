use axum::Json;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use supporttickr_db::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::handlers::users::UserResponse;
use crate::state::AppState;

/// The already-authenticated (user, role, organization) triple. Passed
/// explicitly into every service call; never read from ambient state.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
    pub organization_id: Option<String>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: String,
    role: String,
    #[serde(rename = "organizationId")]
    organization_id: String,
    exp: i64,
    iat: i64,
}

pub fn issue_token(secret: &str, user_id: &str, role: &str, org_id: Option<&str>) -> ApiResult<String> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user_id.to_string(),
        role: role.to_string(),
        organization_id: org_id.unwrap_or_default().to_string(),
        exp: (now + chrono::Duration::hours(24)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Storage(anyhow::anyhow!("failed to sign token: {e}")))
}

fn verify_token(secret: &str, token: &str) -> Result<AuthContext, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    let role = Role::parse(&data.claims.role).ok_or(ApiError::Unauthorized)?;
    let organization_id = match data.claims.organization_id.as_str() {
        "" => None,
        org => Some(org.to_string()),
    };
    Ok(AuthContext {
        user_id: data.claims.user_id,
        role,
        organization_id,
    })
}

/// Bearer-token middleware for the protected route tree.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let ctx = verify_token(&state.config.jwt_secret, token)?;
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidInput(
            "email and password are required".into(),
        ));
    }

    // A missing user and a bad password are indistinguishable to the caller.
    let user = match state.store.get_user_by_email(&req.email).await {
        Ok(user) => user,
        Err(supporttickr_db::StoreError::NotFound(_)) => return Err(ApiError::Unauthorized),
        Err(err) => return Err(err.into()),
    };
    if !bcrypt::verify(&req.password, &user.password_hash).unwrap_or(false) {
        return Err(ApiError::Unauthorized);
    }

    let token = issue_token(
        &state.config.jwt_secret,
        &user.id,
        &user.role,
        user.organization_id.as_deref(),
    )?;
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

pub async fn me(State(state): State<AppState>, ctx: AuthContext) -> ApiResult<Json<UserResponse>> {
    let user = state.store.get_user(&ctx.user_id).await?;
    Ok(Json(user.into()))
}
