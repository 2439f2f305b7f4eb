use crate::auth::AuthContext;
use crate::error::ApiError;

/// Visibility scope derived from the caller's role and organization, applied
/// uniformly to every list and get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Admins and agents see every organization's rows.
    Unrestricted,
    /// Clients see exactly their own organization.
    Organization(String),
}

impl Scope {
    pub fn of(ctx: &AuthContext) -> Scope {
        match (&ctx.role, &ctx.organization_id) {
            (supporttickr_db::models::Role::Client, Some(org)) if !org.is_empty() => {
                Scope::Organization(org.clone())
            }
            _ => Scope::Unrestricted,
        }
    }

    /// The organization filter to push into a list operation, if any.
    pub fn org_filter(&self) -> Option<&str> {
        match self {
            Scope::Unrestricted => None,
            Scope::Organization(org) => Some(org),
        }
    }

    pub fn allows_org(&self, org_id: &str) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::Organization(org) => org == org_id,
        }
    }

    /// Get-path check: the entity exists but is outside the caller's scope.
    pub fn require_org(&self, org_id: &str, what: &'static str) -> Result<(), ApiError> {
        if self.allows_org(org_id) {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied(what))
        }
    }
}
