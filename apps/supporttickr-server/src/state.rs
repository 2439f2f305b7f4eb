use std::sync::Arc;

use supporttickr_db::EntityStore;

use crate::config::Config;
use crate::services::activity_service::ActivityService;
use crate::services::approval_service::ApprovalService;
use crate::services::dashboard_service::DashboardService;
use crate::services::invoice_service::InvoiceService;
use crate::services::org_service::OrgService;
use crate::services::ticket_service::TicketService;
use crate::services::user_service::UserService;

/// Shared per-request state. The store is injected behind the port trait so
/// the whole service layer is backend-agnostic.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub config: Arc<Config>,
    pub activity: Arc<ActivityService>,
    pub tickets: Arc<TicketService>,
    pub approvals: Arc<ApprovalService>,
    pub users: Arc<UserService>,
    pub orgs: Arc<OrgService>,
    pub invoices: Arc<InvoiceService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, config: Config) -> AppState {
        let activity = Arc::new(ActivityService::new(store.clone()));
        AppState {
            tickets: Arc::new(TicketService::new(store.clone(), activity.clone())),
            approvals: Arc::new(ApprovalService::new(store.clone(), activity.clone())),
            users: Arc::new(UserService::new(store.clone())),
            orgs: Arc::new(OrgService::new(store.clone())),
            invoices: Arc::new(InvoiceService::new(store.clone())),
            dashboard: Arc::new(DashboardService::new(store.clone(), activity.clone())),
            activity,
            store,
            config: Arc::new(config),
        }
    }
}
