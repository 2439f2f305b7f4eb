use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use supporttickr_db::EntityStore;
use supporttickr_db::models::Organization;
use supporttickr_db::store::OrganizationPatch;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::scope::Scope;
use crate::services::short_id;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrgRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact_email: String,
    pub plan: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrgRequest {
    pub name: Option<String>,
    pub plan: Option<String>,
    pub contact_email: Option<String>,
}

pub struct OrgService {
    store: Arc<dyn EntityStore>,
}

impl OrgService {
    pub fn new(store: Arc<dyn EntityStore>) -> OrgService {
        OrgService { store }
    }

    fn require_admin(ctx: &AuthContext) -> ApiResult<()> {
        if ctx.is_admin() {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied("admin access required"))
        }
    }

    pub async fn list(&self, ctx: &AuthContext) -> ApiResult<Vec<Organization>> {
        let scope = Scope::of(ctx);
        Ok(self.store.list_organizations(scope.org_filter()).await?)
    }

    pub async fn get(&self, ctx: &AuthContext, id: &str) -> ApiResult<Organization> {
        let org = self.store.get_organization(id).await?;
        Scope::of(ctx).require_org(&org.id, "access denied")?;
        Ok(org)
    }

    pub async fn create(&self, ctx: &AuthContext, req: CreateOrgRequest) -> ApiResult<Organization> {
        Self::require_admin(ctx)?;
        if req.name.trim().is_empty() || req.contact_email.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "name and contactEmail are required".into(),
            ));
        }

        let org = Organization {
            id: short_id("org"),
            name: req.name,
            plan: req.plan.filter(|p| !p.is_empty()).unwrap_or_else(|| "starter".into()),
            contact_email: req.contact_email,
            created_at: Utc::now(),
        };
        self.store.create_organization(&org).await?;
        Ok(org)
    }

    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: &str,
        req: UpdateOrgRequest,
    ) -> ApiResult<Organization> {
        Self::require_admin(ctx)?;
        let patch = OrganizationPatch {
            name: req.name,
            plan: req.plan,
            contact_email: req.contact_email,
        };
        self.store.update_organization(id, &patch).await?;
        Ok(self.store.get_organization(id).await?)
    }

    /// Removes the organization and everything filed under it: users,
    /// tickets, their messages, time entries, conversion requests, invoices.
    pub async fn delete(&self, ctx: &AuthContext, id: &str) -> ApiResult<()> {
        Self::require_admin(ctx)?;
        self.store.get_organization(id).await?;
        Ok(self.store.delete_organization(id).await?)
    }
}
