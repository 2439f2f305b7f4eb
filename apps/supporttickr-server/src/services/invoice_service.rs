use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use supporttickr_db::EntityStore;
use supporttickr_db::models::Invoice;
use supporttickr_db::models::invoice::INVOICE_STATUSES;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::scope::Scope;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    pub organization_id: String,
    pub month: i32,
    pub year: i32,
    #[serde(default)]
    pub tickets_closed: i32,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub rate_per_hour: f64,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceStatusRequest {
    #[serde(default)]
    pub status: String,
}

/// Billing summaries, entered by staff from the aggregates they choose.
/// Nothing here derives amounts from tickets automatically.
pub struct InvoiceService {
    store: Arc<dyn EntityStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn EntityStore>) -> InvoiceService {
        InvoiceService { store }
    }

    fn require_staff(ctx: &AuthContext) -> ApiResult<()> {
        if ctx.is_client() {
            Err(ApiError::PermissionDenied("staff access required"))
        } else {
            Ok(())
        }
    }

    pub async fn list(&self, ctx: &AuthContext) -> ApiResult<Vec<Invoice>> {
        let scope = Scope::of(ctx);
        Ok(self.store.list_invoices(scope.org_filter()).await?)
    }

    pub async fn create(&self, ctx: &AuthContext, req: CreateInvoiceRequest) -> ApiResult<Invoice> {
        Self::require_staff(ctx)?;
        if req.organization_id.is_empty() {
            return Err(ApiError::InvalidInput("organizationId is required".into()));
        }
        if !(1..=12).contains(&req.month) {
            return Err(ApiError::InvalidInput("month must be 1-12".into()));
        }
        self.store.get_organization(&req.organization_id).await?;

        let count = self.store.count_invoices().await?;
        let invoice = Invoice {
            // The billing year the caller asked for, not the wall-clock year;
            // a January entry for December's invoice keeps December's year.
            id: format!("INV-{}-{:03}", req.year, count + 1),
            organization_id: req.organization_id,
            month: req.month,
            year: req.year,
            tickets_closed: req.tickets_closed,
            total_hours: req.total_hours,
            rate_per_hour: req.rate_per_hour,
            total_amount: req.total_hours * req.rate_per_hour,
            status: "draft".into(),
            created_at: Utc::now(),
        };
        self.store.create_invoice(&invoice).await?;
        Ok(invoice)
    }

    pub async fn set_status(
        &self,
        ctx: &AuthContext,
        id: &str,
        req: InvoiceStatusRequest,
    ) -> ApiResult<()> {
        Self::require_staff(ctx)?;
        if !INVOICE_STATUSES.contains(&req.status.as_str()) {
            return Err(ApiError::InvalidInput(format!(
                "unknown invoice status '{}'",
                req.status
            )));
        }
        Ok(self.store.set_invoice_status(id, &req.status).await?)
    }
}
