use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use supporttickr_db::models::{ConversionRequest, Message, Ticket, TimeEntry, conversion};
use supporttickr_db::models::ticket::TICKET_STATUSES;
use supporttickr_db::store::TicketPatch;
use supporttickr_db::{EntityStore, TicketFilter};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::scope::Scope;
use crate::services::activity_service::ActivityService;
use crate::services::short_id;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub organization_id: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Empty string unassigns; absent leaves the assignee unchanged.
    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTimeEntryRequest {
    pub hours: f64,
    #[serde(default)]
    pub description: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConversionRequest {
    #[serde(default)]
    pub proposed_type: String,
    #[serde(default)]
    pub reason: String,
}

/// Ticket plus its expansions, as returned by the detail endpoint. Internal
/// messages are already filtered out for client callers by the time this is
/// assembled.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<Message>,
    pub time_entries: Vec<TimeEntry>,
    pub conversion_request: Option<ConversionRequest>,
}

pub struct TicketService {
    store: Arc<dyn EntityStore>,
    activity: Arc<ActivityService>,
}

impl TicketService {
    pub fn new(store: Arc<dyn EntityStore>, activity: Arc<ActivityService>) -> TicketService {
        TicketService { store, activity }
    }

    /// Fetches a ticket and verifies it is inside the caller's scope. Every
    /// ticket-addressed operation goes through this first.
    async fn scoped_ticket(&self, ctx: &AuthContext, id: &str) -> ApiResult<Ticket> {
        let ticket = self.store.get_ticket(id).await?;
        Scope::of(ctx).require_org(&ticket.organization_id, "access denied")?;
        Ok(ticket)
    }

    pub async fn list(&self, ctx: &AuthContext, mut filter: TicketFilter) -> ApiResult<Vec<Ticket>> {
        // A client's organization filter is forced, whatever the query said.
        if let Some(org) = Scope::of(ctx).org_filter() {
            filter.organization_id = Some(org.to_string());
        }
        Ok(self.store.list_tickets(&filter).await?)
    }

    pub async fn get(&self, ctx: &AuthContext, id: &str) -> ApiResult<TicketDetail> {
        let ticket = self.scoped_ticket(ctx, id).await?;
        let messages = self
            .store
            .list_messages(id, !ctx.is_client())
            .await?;
        let time_entries = self.store.list_time_entries(id).await?;
        let conversion_request = self.store.find_conversion_for_ticket(id).await?;
        Ok(TicketDetail {
            ticket,
            messages,
            time_entries,
            conversion_request,
        })
    }

    pub async fn create(&self, ctx: &AuthContext, req: CreateTicketRequest) -> ApiResult<Ticket> {
        if req.title.trim().is_empty() || req.description.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "title and description are required".into(),
            ));
        }

        // Clients always file under their own organization.
        let organization_id = if ctx.is_client() {
            ctx.organization_id.clone()
        } else {
            req.organization_id.filter(|o| !o.is_empty())
        }
        .ok_or_else(|| ApiError::InvalidInput("organizationId is required".into()))?;
        self.store.get_organization(&organization_id).await?;

        // Numbered from the highest existing suffix, not the row count, so a
        // number freed by a cascade delete is never handed out again.
        let seq = self.store.max_ticket_number().await?;
        let now = Utc::now();
        let ticket = Ticket {
            id: format!("TKT-{:03}", seq + 1),
            title: req.title,
            description: req.description,
            status: "open".into(),
            priority: req.priority.filter(|p| !p.is_empty()).unwrap_or_else(|| "medium".into()),
            category: req.category.filter(|c| !c.is_empty()).unwrap_or_else(|| "support".into()),
            organization_id,
            created_by: ctx.user_id.clone(),
            assigned_to: None,
            hours_worked: 0.0,
            created_at: now,
            updated_at: now,
        };
        self.store.create_ticket(&ticket).await?;

        self.activity
            .record(
                "ticket-created",
                format!("New ticket {}: {}", ticket.id, ticket.title),
                &ctx.user_id,
                Some(&ticket.id),
            )
            .await;
        Ok(ticket)
    }

    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: &str,
        req: UpdateTicketRequest,
    ) -> ApiResult<Ticket> {
        self.scoped_ticket(ctx, id).await?;

        if let Some(status) = &req.status {
            if !TICKET_STATUSES.contains(&status.as_str()) {
                return Err(ApiError::InvalidInput(format!(
                    "unknown ticket status '{status}'"
                )));
            }
        }

        let status_change = req.status.clone();
        let patch = TicketPatch {
            status: req.status,
            priority: req.priority,
            category: None,
            assigned_to: req
                .assigned_to
                .map(|a| if a.is_empty() { None } else { Some(a) }),
        };
        self.store.update_ticket(id, &patch).await?;

        if let Some(status) = status_change {
            let kind = if status == "resolved" {
                "ticket-resolved"
            } else {
                "ticket-updated"
            };
            self.activity
                .record(
                    kind,
                    format!("Ticket {id} status changed to {status}"),
                    &ctx.user_id,
                    Some(id),
                )
                .await;
        }

        Ok(self.store.get_ticket(id).await?)
    }

    pub async fn add_message(
        &self,
        ctx: &AuthContext,
        ticket_id: &str,
        req: AddMessageRequest,
    ) -> ApiResult<Message> {
        if req.content.trim().is_empty() {
            return Err(ApiError::InvalidInput("message content is required".into()));
        }
        self.scoped_ticket(ctx, ticket_id).await?;

        let message = Message {
            id: short_id("msg"),
            ticket_id: ticket_id.to_string(),
            user_id: ctx.user_id.clone(),
            content: req.content,
            // A client cannot author a note it would not be able to read.
            is_internal: req.is_internal && !ctx.is_client(),
            created_at: Utc::now(),
        };
        self.store.create_message(&message).await?;
        self.store.touch_ticket(ticket_id).await?;

        self.activity
            .record(
                "message-added",
                format!("New message on {ticket_id}"),
                &ctx.user_id,
                Some(ticket_id),
            )
            .await;
        Ok(message)
    }

    pub async fn add_time_entry(
        &self,
        ctx: &AuthContext,
        ticket_id: &str,
        req: AddTimeEntryRequest,
    ) -> ApiResult<TimeEntry> {
        if req.hours <= 0.0 {
            return Err(ApiError::InvalidInput("hours must be positive".into()));
        }
        self.scoped_ticket(ctx, ticket_id).await?;

        let now = Utc::now();
        let entry = TimeEntry {
            id: short_id("time"),
            ticket_id: ticket_id.to_string(),
            user_id: ctx.user_id.clone(),
            hours: req.hours,
            description: req.description,
            entry_date: req.date.unwrap_or_else(|| now.date_naive()),
            created_at: now,
        };
        self.store.add_time_entry(&entry).await?;

        self.activity
            .record(
                "time-logged",
                format!("Logged {}h on {ticket_id}", entry.hours),
                &ctx.user_id,
                Some(ticket_id),
            )
            .await;
        Ok(entry)
    }

    pub async fn request_conversion(
        &self,
        ctx: &AuthContext,
        ticket_id: &str,
        req: RequestConversionRequest,
    ) -> ApiResult<ConversionRequest> {
        if req.proposed_type.trim().is_empty() || req.reason.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "proposedType and reason are required".into(),
            ));
        }
        self.scoped_ticket(ctx, ticket_id).await?;

        // One active request per ticket.
        if let Some(existing) = self.store.find_conversion_for_ticket(ticket_id).await? {
            if existing.is_pending() {
                return Err(ApiError::InvalidInput(
                    "a conversion request is already pending for this ticket".into(),
                ));
            }
        }

        let request = ConversionRequest {
            id: short_id("conv"),
            ticket_id: ticket_id.to_string(),
            proposed_type: req.proposed_type,
            reason: req.reason,
            internal_approval: conversion::PENDING.into(),
            client_approval: conversion::PENDING.into(),
            proposed_by: ctx.user_id.clone(),
            created_at: Utc::now(),
        };
        self.store.create_conversion_request(&request).await?;

        self.activity
            .record(
                "conversion-requested",
                format!(
                    "Conversion of {ticket_id} to {} requested",
                    request.proposed_type
                ),
                &ctx.user_id,
                Some(ticket_id),
            )
            .await;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supporttickr_db::models::Role;

    use crate::services::test_support::{ctx, memory_store, seed_org, seed_ticket};

    fn service(store: &Arc<dyn EntityStore>) -> TicketService {
        TicketService::new(store.clone(), Arc::new(ActivityService::new(store.clone())))
    }

    fn create_req(org: Option<&str>) -> CreateTicketRequest {
        CreateTicketRequest {
            title: "Printer on fire".into(),
            description: "Literally".into(),
            organization_id: org.map(Into::into),
            priority: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_sequential_ids() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        let svc = service(&store);
        let admin = ctx("user-admin", Role::Admin, None);

        let first = svc.create(&admin, create_req(Some("org-a"))).await.unwrap();
        assert_eq!(first.id, "TKT-001");
        assert_eq!(first.status, "open");
        assert_eq!(first.priority, "medium");
        assert_eq!(first.category, "support");
        assert_eq!(first.created_by, "user-admin");

        let second = svc.create(&admin, create_req(Some("org-a"))).await.unwrap();
        assert_eq!(second.id, "TKT-002");

        let feed = store.list_activities(None, 50).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert!(feed.iter().all(|a| a.kind == "ticket-created"));
    }

    #[tokio::test]
    async fn ticket_numbers_are_not_reused_after_cascade_delete() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_org(&store, "org-b").await;
        let svc = service(&store);
        let admin = ctx("user-admin", Role::Admin, None);

        svc.create(&admin, create_req(Some("org-a"))).await.unwrap();
        svc.create(&admin, create_req(Some("org-a"))).await.unwrap();
        let third = svc.create(&admin, create_req(Some("org-b"))).await.unwrap();
        assert_eq!(third.id, "TKT-003");

        store.delete_organization("org-a").await.unwrap();

        // TKT-001 and TKT-002 are gone; the next ticket must not reclaim
        // their numbers and silently alias the survivor's id space.
        let fourth = svc.create(&admin, create_req(Some("org-b"))).await.unwrap();
        assert_eq!(fourth.id, "TKT-004");

        let survivor = store.get_ticket("TKT-003").await.unwrap();
        assert_eq!(survivor.organization_id, "org-b");
    }

    #[tokio::test]
    async fn create_rejects_blank_fields_and_unknown_org() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        let svc = service(&store);
        let admin = ctx("user-admin", Role::Admin, None);

        let mut req = create_req(Some("org-a"));
        req.title = "  ".into();
        assert!(matches!(
            svc.create(&admin, req).await,
            Err(ApiError::InvalidInput(_))
        ));

        assert!(matches!(
            svc.create(&admin, create_req(Some("org-missing"))).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            svc.create(&admin, create_req(None)).await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn client_creates_under_own_org_regardless_of_request() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_org(&store, "org-b").await;
        let svc = service(&store);
        let client = ctx("user-client", Role::Client, Some("org-a"));

        let ticket = svc.create(&client, create_req(Some("org-b"))).await.unwrap();
        assert_eq!(ticket.organization_id, "org-a");
    }

    #[tokio::test]
    async fn client_list_is_forced_to_their_org() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_org(&store, "org-b").await;
        seed_ticket(&store, "TKT-001", "org-a").await;
        seed_ticket(&store, "TKT-002", "org-b").await;
        let svc = service(&store);

        let client = ctx("user-client", Role::Client, Some("org-a"));
        let mut filter = TicketFilter::default();
        filter.organization_id = Some("org-b".into());
        let visible = svc.list(&client, filter).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].organization_id, "org-a");

        let admin = ctx("user-admin", Role::Admin, None);
        let all = svc.list(&admin, TicketFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn out_of_scope_get_is_denied_not_missing() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_org(&store, "org-b").await;
        seed_ticket(&store, "TKT-001", "org-b").await;
        let svc = service(&store);
        let client = ctx("user-client", Role::Client, Some("org-a"));

        assert!(matches!(
            svc.get(&client, "TKT-001").await,
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(matches!(
            svc.get(&client, "TKT-404").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn detail_hides_internal_messages_from_clients() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_ticket(&store, "TKT-001", "org-a").await;
        let svc = service(&store);
        let agent = ctx("user-agent", Role::Agent, None);
        let client = ctx("user-client", Role::Client, Some("org-a"));

        svc.add_message(
            &agent,
            "TKT-001",
            AddMessageRequest {
                content: "public update".into(),
                is_internal: false,
            },
        )
        .await
        .unwrap();
        svc.add_message(
            &agent,
            "TKT-001",
            AddMessageRequest {
                content: "internal note".into(),
                is_internal: true,
            },
        )
        .await
        .unwrap();

        let staff_view = svc.get(&agent, "TKT-001").await.unwrap();
        assert_eq!(staff_view.messages.len(), 2);

        let client_view = svc.get(&client, "TKT-001").await.unwrap();
        assert_eq!(client_view.messages.len(), 1);
        assert!(!client_view.messages[0].is_internal);
    }

    #[tokio::test]
    async fn client_messages_are_never_internal() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_ticket(&store, "TKT-001", "org-a").await;
        let svc = service(&store);
        let client = ctx("user-client", Role::Client, Some("org-a"));

        let msg = svc
            .add_message(
                &client,
                "TKT-001",
                AddMessageRequest {
                    content: "can you see this?".into(),
                    is_internal: true,
                },
            )
            .await
            .unwrap();
        assert!(!msg.is_internal);

        assert!(matches!(
            svc.add_message(
                &client,
                "TKT-001",
                AddMessageRequest {
                    content: "   ".into(),
                    is_internal: false
                }
            )
            .await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn update_validates_status_and_logs_resolution() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_ticket(&store, "TKT-001", "org-a").await;
        let svc = service(&store);
        let agent = ctx("user-agent", Role::Agent, None);

        let err = svc
            .update(
                &agent,
                "TKT-001",
                UpdateTicketRequest {
                    status: Some("escalated".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(err, Err(ApiError::InvalidInput(_))));

        let updated = svc
            .update(
                &agent,
                "TKT-001",
                UpdateTicketRequest {
                    status: Some("resolved".into()),
                    priority: Some("high".into()),
                    assigned_to: Some("user-agent".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, "resolved");
        assert_eq!(updated.priority, "high");
        assert_eq!(updated.assigned_to.as_deref(), Some("user-agent"));

        let feed = store.list_activities(None, 50).await.unwrap();
        assert_eq!(feed[0].kind, "ticket-resolved");

        // Empty string clears the assignee.
        let cleared = svc
            .update(
                &agent,
                "TKT-001",
                UpdateTicketRequest {
                    assigned_to: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.assigned_to, None);
    }

    #[tokio::test]
    async fn time_entries_accumulate_on_the_ticket() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_ticket(&store, "TKT-001", "org-a").await;
        let svc = service(&store);
        let agent = ctx("user-agent", Role::Agent, None);

        assert!(matches!(
            svc.add_time_entry(
                &agent,
                "TKT-001",
                AddTimeEntryRequest {
                    hours: 0.0,
                    description: String::new(),
                    date: None
                }
            )
            .await,
            Err(ApiError::InvalidInput(_))
        ));

        for hours in [2.5, 1.5] {
            svc.add_time_entry(
                &agent,
                "TKT-001",
                AddTimeEntryRequest {
                    hours,
                    description: "debugging".into(),
                    date: None,
                },
            )
            .await
            .unwrap();
        }

        let detail = svc.get(&agent, "TKT-001").await.unwrap();
        assert_eq!(detail.time_entries.len(), 2);
        assert!((detail.ticket.hours_worked - 4.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn conversion_request_is_single_flight_per_ticket() {
        let store = memory_store();
        seed_org(&store, "org-a").await;
        seed_ticket(&store, "TKT-001", "org-a").await;
        let svc = service(&store);
        let agent = ctx("user-agent", Role::Agent, None);

        assert!(matches!(
            svc.request_conversion(
                &agent,
                "TKT-001",
                RequestConversionRequest {
                    proposed_type: "project".into(),
                    reason: String::new()
                }
            )
            .await,
            Err(ApiError::InvalidInput(_))
        ));

        let request = svc
            .request_conversion(
                &agent,
                "TKT-001",
                RequestConversionRequest {
                    proposed_type: "project".into(),
                    reason: "multi-week effort".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(request.internal_approval, "pending");
        assert_eq!(request.client_approval, "pending");

        assert!(matches!(
            svc.request_conversion(
                &agent,
                "TKT-001",
                RequestConversionRequest {
                    proposed_type: "project".into(),
                    reason: "again".into()
                }
            )
            .await,
            Err(ApiError::InvalidInput(_))
        ));

        let detail = svc.get(&agent, "TKT-001").await.unwrap();
        assert_eq!(
            detail.conversion_request.map(|c| c.id),
            Some(request.id)
        );
    }
}
