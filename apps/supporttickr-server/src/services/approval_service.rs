use std::sync::Arc;

use serde::Deserialize;

use supporttickr_db::EntityStore;
use supporttickr_db::models::conversion::{APPROVED, REJECTED};
use supporttickr_db::models::{ApprovalSide, ConversionRequest};
use supporttickr_db::store::TicketPatch;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::scope::Scope;
use crate::services::activity_service::ActivityService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalUpdateRequest {
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub status: String,
}

/// Dual-sided sign-off on conversion requests. The internal side belongs to
/// staff, the client side to the affected organization (or an admin acting on
/// its behalf). The ticket's category changes only once both sides approve.
pub struct ApprovalService {
    store: Arc<dyn EntityStore>,
    activity: Arc<ActivityService>,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn EntityStore>, activity: Arc<ActivityService>) -> ApprovalService {
        ApprovalService { store, activity }
    }

    /// Requests still awaiting at least one side, newest first, scoped to the
    /// caller's organization for clients.
    pub async fn list_pending(&self, ctx: &AuthContext) -> ApiResult<Vec<ConversionRequest>> {
        let scope = Scope::of(ctx);
        Ok(self
            .store
            .list_pending_conversion_requests(scope.org_filter())
            .await?)
    }

    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: &str,
        req: ApprovalUpdateRequest,
    ) -> ApiResult<ConversionRequest> {
        let side = ApprovalSide::parse(&req.side)
            .ok_or_else(|| ApiError::InvalidInput(format!("unknown approval side '{}'", req.side)))?;
        if req.status != APPROVED && req.status != REJECTED {
            return Err(ApiError::InvalidInput(format!(
                "approval status must be 'approved' or 'rejected', got '{}'",
                req.status
            )));
        }

        match side {
            ApprovalSide::Internal if ctx.is_client() => {
                return Err(ApiError::PermissionDenied(
                    "only staff may set the internal approval",
                ));
            }
            ApprovalSide::Client if !ctx.is_client() && !ctx.is_admin() => {
                return Err(ApiError::PermissionDenied(
                    "only the client or an admin may set the client approval",
                ));
            }
            _ => {}
        }

        let request = self.store.get_conversion_request(id).await?;
        let ticket = self.store.get_ticket(&request.ticket_id).await?;
        Scope::of(ctx).require_org(&ticket.organization_id, "access denied")?;

        self.store.set_approval(id, side, &req.status).await?;

        // Re-read and react to the resulting state rather than the edge: a
        // repeat approval converges on the same outcome.
        let request = self.store.get_conversion_request(id).await?;
        if request.is_fully_approved() {
            let patch = TicketPatch {
                category: Some(request.proposed_type.clone()),
                ..Default::default()
            };
            self.store.update_ticket(&request.ticket_id, &patch).await?;
        }

        let kind = if req.status == REJECTED {
            "conversion-rejected"
        } else if request.is_fully_approved() {
            "conversion-approved"
        } else {
            "conversion-updated"
        };
        self.activity
            .record(
                kind,
                format!(
                    "{} side {} conversion for {}",
                    side.as_str(),
                    req.status,
                    request.ticket_id
                ),
                &ctx.user_id,
                Some(&request.ticket_id),
            )
            .await;

        Ok(request)
    }
}
