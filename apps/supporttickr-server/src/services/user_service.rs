use std::sync::Arc;

use serde::Deserialize;

use supporttickr_db::models::{Role, User, user::avatar_initials};
use supporttickr_db::store::UserPatch;
use supporttickr_db::{EntityStore, StoreError};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::scope::Scope;
use crate::services::short_id;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    pub password: Option<String>,
    pub organization_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    /// Empty string detaches the user from their organization.
    pub organization_id: Option<String>,
}

pub struct UserService {
    store: Arc<dyn EntityStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn EntityStore>) -> UserService {
        UserService { store }
    }

    fn require_admin(ctx: &AuthContext) -> ApiResult<()> {
        if ctx.is_admin() {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied("admin access required"))
        }
    }

    /// Rejects an email already held by another user. Uniqueness lives here
    /// rather than in the adapters so both backends refuse duplicates the
    /// same way, with a caller-fixable error.
    async fn require_email_free(&self, email: &str, for_user: Option<&str>) -> ApiResult<()> {
        match self.store.get_user_by_email(email).await {
            Ok(existing) if Some(existing.id.as_str()) != for_user => Err(ApiError::InvalidInput(
                "email is already in use".into(),
            )),
            Ok(_) => Ok(()),
            Err(StoreError::NotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Directory listing. Clients see their organization's users plus
    /// unattached staff; staff see everyone.
    pub async fn list(&self, ctx: &AuthContext) -> ApiResult<Vec<User>> {
        let scope = Scope::of(ctx);
        Ok(self.store.list_users(scope.org_filter()).await?)
    }

    pub async fn get(&self, ctx: &AuthContext, id: &str) -> ApiResult<User> {
        let user = self.store.get_user(id).await?;
        if let Some(org) = &user.organization_id {
            Scope::of(ctx).require_org(org, "access denied")?;
        }
        Ok(user)
    }

    pub async fn create(&self, ctx: &AuthContext, req: CreateUserRequest) -> ApiResult<User> {
        Self::require_admin(ctx)?;
        if req.name.trim().is_empty() || req.email.trim().is_empty() {
            return Err(ApiError::InvalidInput("name and email are required".into()));
        }
        let role = Role::parse(&req.role)
            .ok_or_else(|| ApiError::InvalidInput(format!("unknown role '{}'", req.role)))?;
        self.require_email_free(&req.email, None).await?;

        let password = req.password.as_deref().filter(|p| !p.is_empty()).unwrap_or("changeme123");
        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| ApiError::Storage(anyhow::anyhow!("failed to hash password: {e}")))?;

        let user = User {
            id: short_id("user"),
            avatar: avatar_initials(&req.name),
            name: req.name,
            email: req.email,
            password_hash,
            role: role.as_str().into(),
            organization_id: req.organization_id.filter(|o| !o.is_empty()),
        };
        self.store.create_user(&user).await?;
        Ok(user)
    }

    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: &str,
        req: UpdateUserRequest,
    ) -> ApiResult<User> {
        Self::require_admin(ctx)?;
        if let Some(role) = &req.role {
            if Role::parse(role).is_none() {
                return Err(ApiError::InvalidInput(format!("unknown role '{role}'")));
            }
        }
        if let Some(email) = &req.email {
            self.require_email_free(email, Some(id)).await?;
        }

        let patch = UserPatch {
            avatar: req.name.as_deref().map(avatar_initials),
            name: req.name,
            email: req.email,
            role: req.role,
            password_hash: None,
            organization_id: req
                .organization_id
                .map(|o| if o.is_empty() { None } else { Some(o) }),
        };
        self.store.update_user(id, &patch).await?;
        Ok(self.store.get_user(id).await?)
    }

    pub async fn delete(&self, ctx: &AuthContext, id: &str) -> ApiResult<()> {
        Self::require_admin(ctx)?;
        // Checked before any write so a failed self-delete has no side effects.
        if id == ctx.user_id {
            return Err(ApiError::InvalidInput("you cannot delete yourself".into()));
        }
        self.store.get_user(id).await?;
        Ok(self.store.delete_user(id).await?)
    }
}
