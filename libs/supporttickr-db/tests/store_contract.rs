//! Behavioral contract for the entity store port, run against every adapter.
//!
//! The key-value adapter runs unconditionally on the in-memory engine. The
//! Postgres adapter runs only when TEST_DATABASE_URL points at a disposable
//! database; without it the Postgres case is skipped.

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use supporttickr_db::models::conversion::{APPROVED, PENDING};
use supporttickr_db::models::{
    ActivityItem, ApprovalSide, ConversionRequest, Invoice, Message, Organization, Ticket,
    TimeEntry, User,
};
use supporttickr_db::store::kv::{KvStore, MemoryKv};
use supporttickr_db::store::pg::PgStore;
use supporttickr_db::store::{EntityStore, StoreError, TicketFilter, TicketPatch, UserPatch};

fn at(minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap()
}

fn org(id: &str, name: &str) -> Organization {
    Organization {
        id: id.into(),
        name: name.into(),
        plan: "starter".into(),
        contact_email: format!("{id}@example.com"),
        created_at: at(0),
    }
}

fn user(id: &str, name: &str, role: &str, org_id: Option<&str>) -> User {
    User {
        id: id.into(),
        name: name.into(),
        email: format!("{id}@example.com"),
        password_hash: "$2a$10$hash".into(),
        role: role.into(),
        organization_id: org_id.map(Into::into),
        avatar: "XX".into(),
    }
}

fn ticket(id: &str, org_id: &str, minute: u32) -> Ticket {
    Ticket {
        id: id.into(),
        title: format!("Ticket {id}"),
        description: "Something broke".into(),
        status: "open".into(),
        priority: "medium".into(),
        category: "support".into(),
        organization_id: org_id.into(),
        created_by: "user-agent".into(),
        assigned_to: None,
        hours_worked: 0.0,
        created_at: at(minute),
        updated_at: at(minute),
    }
}

async fn seed_base(store: &dyn EntityStore) {
    store.create_organization(&org("org-a", "Acme")).await.unwrap();
    store.create_organization(&org("org-b", "Bolt")).await.unwrap();
    store
        .create_user(&user("user-agent", "Agent Smith", "agent", None))
        .await
        .unwrap();
    store
        .create_user(&user("user-client", "Client Jones", "client", Some("org-a")))
        .await
        .unwrap();
}

async fn contract_not_found_is_distinct(store: &dyn EntityStore) {
    match store.get_ticket("TKT-missing").await {
        Err(StoreError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    match store.update_ticket("TKT-missing", &TicketPatch::default()).await {
        // Empty patch is a no-op regardless of existence.
        Ok(()) => {}
        other => panic!("expected Ok for empty patch, got {other:?}"),
    }
    let patch = TicketPatch {
        status: Some("open".into()),
        ..Default::default()
    };
    match store.update_ticket("TKT-missing", &patch).await {
        Err(StoreError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

async fn contract_users(store: &dyn EntityStore) {
    let by_email = store.get_user_by_email("user-client@example.com").await.unwrap();
    assert_eq!(by_email.id, "user-client");
    assert_eq!(by_email.password_hash, "$2a$10$hash");

    // Client visibility: own-org users plus internal staff.
    store
        .create_user(&user("user-other", "Other Org", "client", Some("org-b")))
        .await
        .unwrap();
    let visible = store.list_users(Some("org-a")).await.unwrap();
    let ids: Vec<&str> = visible.iter().map(|u| u.id.as_str()).collect();
    assert!(ids.contains(&"user-client"));
    assert!(ids.contains(&"user-agent"));
    assert!(!ids.contains(&"user-other"));

    // Patch with explicit org clear.
    let patch = UserPatch {
        name: Some("Renamed".into()),
        organization_id: Some(None),
        ..Default::default()
    };
    store.update_user("user-other", &patch).await.unwrap();
    let updated = store.get_user("user-other").await.unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.organization_id, None);

    store.delete_user("user-other").await.unwrap();
    assert!(matches!(
        store.get_user("user-other").await,
        Err(StoreError::NotFound(_))
    ));
}

async fn contract_ticket_filters_and_ordering(store: &dyn EntityStore) {
    let mut t1 = ticket("TKT-001", "org-a", 1);
    t1.title = "Billing question".into();
    t1.priority = "high".into();
    let mut t2 = ticket("TKT-002", "org-a", 2);
    t2.status = "resolved".into();
    let t3 = ticket("TKT-003", "org-b", 3);
    for t in [&t1, &t2, &t3] {
        store.create_ticket(t).await.unwrap();
    }

    // Newest first.
    let all = store.list_tickets(&TicketFilter::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["TKT-003", "TKT-002", "TKT-001"]);

    let org_scope = store
        .list_tickets(&TicketFilter::for_organization("org-a"))
        .await
        .unwrap();
    assert_eq!(org_scope.len(), 2);

    let mut f = TicketFilter::for_organization("org-a");
    f.status = Some("resolved".into());
    let resolved = store.list_tickets(&f).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, "TKT-002");

    let mut search = TicketFilter::default();
    search.search = Some("BILLING".into());
    let hits = store.list_tickets(&search).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "TKT-001");

    // Assignment set and clear.
    let assign = TicketPatch {
        assigned_to: Some(Some("user-agent".into())),
        ..Default::default()
    };
    store.update_ticket("TKT-001", &assign).await.unwrap();
    assert_eq!(
        store.get_ticket("TKT-001").await.unwrap().assigned_to.as_deref(),
        Some("user-agent")
    );
    let clear = TicketPatch {
        assigned_to: Some(None),
        ..Default::default()
    };
    store.update_ticket("TKT-001", &clear).await.unwrap();
    assert_eq!(store.get_ticket("TKT-001").await.unwrap().assigned_to, None);

    // Deleting a user unassigns their tickets.
    store.update_ticket("TKT-001", &assign).await.unwrap();
    store
        .create_user(&user("user-temp", "Temp", "agent", None))
        .await
        .unwrap();
    let reassign = TicketPatch {
        assigned_to: Some(Some("user-temp".into())),
        ..Default::default()
    };
    store.update_ticket("TKT-002", &reassign).await.unwrap();
    store.delete_user("user-temp").await.unwrap();
    assert_eq!(store.get_ticket("TKT-002").await.unwrap().assigned_to, None);
    assert_eq!(
        store.get_ticket("TKT-001").await.unwrap().assigned_to.as_deref(),
        Some("user-agent")
    );
}

async fn contract_create_conflicts_keep_existing(store: &dyn EntityStore) {
    // A second create under a taken id must fail loudly and leave the
    // original record exactly as it was, on every backend.
    let mut impostor = ticket("TKT-001", "org-b", 9);
    impostor.title = "Hijacked".into();
    match store.create_ticket(&impostor).await {
        Err(StoreError::Conflict(_)) => {}
        other => panic!("expected Conflict, got {other:?}"),
    }
    let original = store.get_ticket("TKT-001").await.unwrap();
    assert_eq!(original.title, "Billing question");
    assert_eq!(original.organization_id, "org-a");

    match store
        .create_user(&user("user-agent", "Agent Clone", "admin", None))
        .await
    {
        Err(StoreError::Conflict(_)) => {}
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert_eq!(store.get_user("user-agent").await.unwrap().name, "Agent Smith");
}

async fn contract_messages_partition(store: &dyn EntityStore) {
    let base = at(10);
    for (id, internal, minute) in [("msg-pub", false, 0), ("msg-int", true, 1)] {
        store
            .create_message(&Message {
                id: id.into(),
                ticket_id: "TKT-001".into(),
                user_id: "user-agent".into(),
                content: format!("content of {id}"),
                is_internal: internal,
                created_at: base + Duration::minutes(minute),
            })
            .await
            .unwrap();
    }

    let client_view = store.list_messages("TKT-001", false).await.unwrap();
    assert_eq!(client_view.len(), 1);
    assert_eq!(client_view[0].id, "msg-pub");
    assert!(client_view.iter().all(|m| !m.is_internal));

    let staff_view = store.list_messages("TKT-001", true).await.unwrap();
    assert_eq!(staff_view.len(), 2);
    // Oldest first within a ticket.
    assert_eq!(staff_view[0].id, "msg-pub");
}

async fn contract_time_entries_accumulate(store: &dyn EntityStore) {
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let entry = |id: &str, hours: f64| TimeEntry {
        id: id.into(),
        ticket_id: "TKT-001".into(),
        user_id: "user-agent".into(),
        hours,
        description: "work".into(),
        entry_date: date,
        created_at: at(20),
    };

    assert_eq!(store.get_ticket("TKT-001").await.unwrap().hours_worked, 0.0);
    store.add_time_entry(&entry("te-1", 2.5)).await.unwrap();
    assert_eq!(store.get_ticket("TKT-001").await.unwrap().hours_worked, 2.5);
    store.add_time_entry(&entry("te-2", 1.5)).await.unwrap();
    assert_eq!(store.get_ticket("TKT-001").await.unwrap().hours_worked, 4.0);

    let entries = store.list_time_entries("TKT-001").await.unwrap();
    assert_eq!(entries.len(), 2);

    // Entry against a missing ticket fails without a partial write.
    assert!(matches!(
        store
            .add_time_entry(&TimeEntry {
                ticket_id: "TKT-missing".into(),
                ..entry("te-3", 1.0)
            })
            .await,
        Err(StoreError::NotFound(_))
    ));
}

async fn contract_conversion_requests(store: &dyn EntityStore) {
    let request = ConversionRequest {
        id: "cr-1".into(),
        ticket_id: "TKT-001".into(),
        proposed_type: "billing".into(),
        reason: "recurring infra work".into(),
        internal_approval: PENDING.into(),
        client_approval: PENDING.into(),
        proposed_by: "user-agent".into(),
        created_at: at(30),
    };
    store.create_conversion_request(&request).await.unwrap();

    let found = store.find_conversion_for_ticket("TKT-001").await.unwrap();
    assert_eq!(found.unwrap().id, "cr-1");
    assert!(store.find_conversion_for_ticket("TKT-003").await.unwrap().is_none());

    // Pending list is scoped through the ticket's organization.
    let scoped = store.list_pending_conversion_requests(Some("org-a")).await.unwrap();
    assert_eq!(scoped.len(), 1);
    let other_org = store.list_pending_conversion_requests(Some("org-b")).await.unwrap();
    assert!(other_org.is_empty());

    store
        .set_approval("cr-1", ApprovalSide::Internal, APPROVED)
        .await
        .unwrap();
    let cr = store.get_conversion_request("cr-1").await.unwrap();
    assert_eq!(cr.internal_approval, APPROVED);
    assert_eq!(cr.client_approval, PENDING);
    assert!(!cr.is_fully_approved());
    assert_eq!(store.count_pending_approvals(Some("org-a")).await.unwrap(), 1);

    store
        .set_approval("cr-1", ApprovalSide::Client, APPROVED)
        .await
        .unwrap();
    let cr = store.get_conversion_request("cr-1").await.unwrap();
    assert!(cr.is_fully_approved());
    assert!(store
        .list_pending_conversion_requests(None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(store.count_pending_approvals(None).await.unwrap(), 0);
}

async fn contract_invoices(store: &dyn EntityStore) {
    let invoice = |id: &str, org_id: &str, year: i32, month: i32| Invoice {
        id: id.into(),
        organization_id: org_id.into(),
        month,
        year,
        tickets_closed: 3,
        total_hours: 12.5,
        rate_per_hour: 100.0,
        total_amount: 1250.0,
        status: "draft".into(),
        created_at: at(40),
    };
    store.create_invoice(&invoice("INV-2024-001", "org-a", 2024, 1)).await.unwrap();
    store.create_invoice(&invoice("INV-2024-002", "org-a", 2024, 2)).await.unwrap();
    store.create_invoice(&invoice("INV-2023-001", "org-b", 2023, 12)).await.unwrap();

    let all = store.list_invoices(None).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["INV-2024-002", "INV-2024-001", "INV-2023-001"]);

    let scoped = store.list_invoices(Some("org-a")).await.unwrap();
    assert_eq!(scoped.len(), 2);
    assert_eq!(store.count_invoices().await.unwrap(), 3);

    store.set_invoice_status("INV-2024-001", "sent").await.unwrap();
    let refreshed = store.list_invoices(Some("org-a")).await.unwrap();
    assert!(refreshed.iter().any(|i| i.id == "INV-2024-001" && i.status == "sent"));
    assert!(matches!(
        store.set_invoice_status("INV-missing", "paid").await,
        Err(StoreError::NotFound(_))
    ));
}

async fn contract_activities(store: &dyn EntityStore) {
    let act = |id: &str, ticket: Option<&str>, minute: u32| ActivityItem {
        id: id.into(),
        kind: "ticket-updated".into(),
        description: format!("activity {id}"),
        user_id: "user-agent".into(),
        ticket_id: ticket.map(Into::into),
        created_at: at(minute),
    };
    store.append_activity(&act("act-1", Some("TKT-001"), 50)).await.unwrap();
    store.append_activity(&act("act-2", Some("TKT-003"), 51)).await.unwrap();
    store.append_activity(&act("act-3", None, 52)).await.unwrap();

    let all = store.list_activities(None, 50).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["act-3", "act-2", "act-1"]);

    // Org scope keeps ticketless entries and drops foreign-org tickets.
    let scoped = store.list_activities(Some("org-a"), 50).await.unwrap();
    let ids: Vec<&str> = scoped.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["act-3", "act-1"]);

    let limited = store.list_activities(None, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
}

async fn contract_equal_timestamps_order_by_id(store: &dyn EntityStore) {
    // Same created_at; the id is the tie-break, so both adapters agree.
    store.create_ticket(&ticket("TKT-004", "org-b", 5)).await.unwrap();
    store.create_ticket(&ticket("TKT-005", "org-b", 5)).await.unwrap();
    let org_b = store
        .list_tickets(&TicketFilter::for_organization("org-b"))
        .await
        .unwrap();
    let ids: Vec<&str> = org_b.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["TKT-005", "TKT-004", "TKT-003"]);

    for id in ["act-4", "act-5"] {
        store
            .append_activity(&ActivityItem {
                id: id.into(),
                kind: "ticket-updated".into(),
                description: format!("activity {id}"),
                user_id: "user-agent".into(),
                ticket_id: None,
                created_at: at(55),
            })
            .await
            .unwrap();
    }
    let feed = store.list_activities(None, 2).await.unwrap();
    let ids: Vec<&str> = feed.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["act-5", "act-4"]);
}

async fn contract_org_cascade(store: &dyn EntityStore) {
    store.delete_organization("org-a").await.unwrap();

    assert!(matches!(
        store.get_organization("org-a").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.get_ticket("TKT-001").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(store.list_messages("TKT-001", true).await.unwrap().is_empty());
    assert!(store.list_time_entries("TKT-001").await.unwrap().is_empty());
    assert!(store.find_conversion_for_ticket("TKT-001").await.unwrap().is_none());
    assert!(store.list_invoices(Some("org-a")).await.unwrap().is_empty());
    assert!(matches!(
        store.get_user("user-client").await,
        Err(StoreError::NotFound(_))
    ));
    // Internal staff and other organizations survive.
    assert!(store.get_user("user-agent").await.is_ok());
    assert!(store.get_ticket("TKT-003").await.is_ok());

    // Numbers freed by the cascade stay burned for id generation.
    assert_eq!(store.max_ticket_number().await.unwrap(), 5);
}

async fn run_full_contract(store: &dyn EntityStore) {
    seed_base(store).await;
    contract_not_found_is_distinct(store).await;
    contract_users(store).await;
    contract_ticket_filters_and_ordering(store).await;
    contract_create_conflicts_keep_existing(store).await;
    contract_messages_partition(store).await;
    contract_time_entries_accumulate(store).await;
    contract_conversion_requests(store).await;
    contract_invoices(store).await;
    contract_activities(store).await;
    contract_equal_timestamps_order_by_id(store).await;
    contract_org_cascade(store).await;
}

#[tokio::test]
async fn kv_adapter_satisfies_contract() {
    let store = KvStore::new(MemoryKv::new());
    run_full_contract(&store).await;
}

#[tokio::test]
async fn pg_adapter_satisfies_contract() {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping Postgres contract run");
        return;
    };
    let pool = supporttickr_db::connect_postgres(&url).await.unwrap();
    // The contract assumes an empty store.
    supporttickr_db::sqlx::query(
        "TRUNCATE activities, invoices, conversion_requests, time_entries, messages, tickets, users, organizations",
    )
    .execute(&pool)
    .await
    .unwrap();
    let store = PgStore::new(pool);
    run_full_contract(&store).await;
}
