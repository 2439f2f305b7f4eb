pub mod filter;
pub mod kv;
pub mod pg;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    ActivityItem, ApprovalSide, ConversionRequest, Invoice, Message, Organization, Ticket,
    TicketStats, TimeEntry, User,
};
pub use filter::TicketFilter;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The entity does not exist. Callers map this to 404-equivalent handling,
    /// distinct from operational failures.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Create with an id that is already taken. The existing record is left
    /// untouched on every backend.
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Field-by-field optional user patch. `organization_id` uses the outer Option
/// for "leave unchanged" and the inner for "clear".
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub avatar: Option<String>,
    pub password_hash: Option<String>,
    pub organization_id: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.avatar.is_none()
            && self.password_hash.is_none()
            && self.organization_id.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrganizationPatch {
    pub name: Option<String>,
    pub plan: Option<String>,
    pub contact_email: Option<String>,
}

impl OrganizationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.plan.is_none() && self.contact_email.is_none()
    }
}

/// Ticket patch. Deliberately has no `organization_id` field: a ticket's
/// organization is immutable after creation on every backend.
#[derive(Debug, Clone, Default)]
pub struct TicketPatch {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub assigned_to: Option<Option<String>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.assigned_to.is_none()
    }
}

/// Storage-agnostic port over the six entity kinds plus invoices and the
/// activity log. One async method per (entity, operation) pair; ids are
/// caller-supplied, and a create against a taken id fails with `Conflict`
/// without touching the existing record.
///
/// Implementations must be behaviorally indistinguishable: same filters, same
/// ordering (creation time descending unless noted), same NotFound signaling.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Users. `visible_to_org` limits the list to that organization's users
    // plus internal staff (null organization); ordering is by name.
    async fn get_user(&self, id: &str) -> StoreResult<User>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn list_users(&self, visible_to_org: Option<&str>) -> StoreResult<Vec<User>>;
    async fn create_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<()>;
    /// Unassigns the user's tickets, then removes the user.
    async fn delete_user(&self, id: &str) -> StoreResult<()>;

    // Organizations, ordered by name.
    async fn get_organization(&self, id: &str) -> StoreResult<Organization>;
    async fn list_organizations(&self, only_org: Option<&str>) -> StoreResult<Vec<Organization>>;
    async fn create_organization(&self, org: &Organization) -> StoreResult<()>;
    async fn update_organization(&self, id: &str, patch: &OrganizationPatch) -> StoreResult<()>;
    /// Full cascade: the organization's time entries, messages, conversion
    /// requests, tickets, invoices and users go with it.
    async fn delete_organization(&self, id: &str) -> StoreResult<()>;

    // Tickets, ordered by created_at descending.
    async fn get_ticket(&self, id: &str) -> StoreResult<Ticket>;
    async fn list_tickets(&self, filter: &TicketFilter) -> StoreResult<Vec<Ticket>>;
    async fn create_ticket(&self, ticket: &Ticket) -> StoreResult<()>;
    async fn update_ticket(&self, id: &str, patch: &TicketPatch) -> StoreResult<()>;
    /// Bumps updated_at without changing anything else.
    async fn touch_ticket(&self, id: &str) -> StoreResult<()>;
    /// Highest numeric suffix among `TKT-` ids, 0 when there are none. Id
    /// generation uses this rather than a row count so numbers freed by a
    /// cascade delete are never reissued.
    async fn max_ticket_number(&self) -> StoreResult<i64>;
    async fn ticket_stats(&self, org: Option<&str>) -> StoreResult<TicketStats>;

    // Messages, ordered by created_at ascending within a ticket.
    async fn list_messages(
        &self,
        ticket_id: &str,
        include_internal: bool,
    ) -> StoreResult<Vec<Message>>;
    async fn create_message(&self, message: &Message) -> StoreResult<()>;

    // Time entries, ordered by entry date ascending. Creation also adds the
    // entry's hours to the parent ticket's hours_worked; the relational
    // backend does both in one transaction, the key-value backend is
    // read-then-write best effort.
    async fn list_time_entries(&self, ticket_id: &str) -> StoreResult<Vec<TimeEntry>>;
    async fn add_time_entry(&self, entry: &TimeEntry) -> StoreResult<()>;

    // Conversion requests; at most one per ticket in this design.
    async fn get_conversion_request(&self, id: &str) -> StoreResult<ConversionRequest>;
    async fn find_conversion_for_ticket(
        &self,
        ticket_id: &str,
    ) -> StoreResult<Option<ConversionRequest>>;
    /// Requests with at least one side still pending, newest first, optionally
    /// limited to tickets of one organization.
    async fn list_pending_conversion_requests(
        &self,
        org: Option<&str>,
    ) -> StoreResult<Vec<ConversionRequest>>;
    async fn create_conversion_request(&self, request: &ConversionRequest) -> StoreResult<()>;
    async fn set_approval(&self, id: &str, side: ApprovalSide, status: &str) -> StoreResult<()>;
    /// Dashboard count. For an organization scope only the client side is
    /// considered pending; unscoped, either side counts.
    async fn count_pending_approvals(&self, org: Option<&str>) -> StoreResult<i64>;

    // Invoices, ordered by (year, month) descending.
    async fn list_invoices(&self, org: Option<&str>) -> StoreResult<Vec<Invoice>>;
    async fn create_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn count_invoices(&self) -> StoreResult<i64>;
    async fn set_invoice_status(&self, id: &str, status: &str) -> StoreResult<()>;

    // Activity log: append-only, newest first. An organization scope sees
    // entries with no ticket or whose ticket belongs to that organization.
    async fn append_activity(&self, activity: &ActivityItem) -> StoreResult<()>;
    async fn list_activities(
        &self,
        org: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<ActivityItem>>;
}
