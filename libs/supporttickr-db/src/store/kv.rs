use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{
    ActivityItem, ApprovalSide, ConversionRequest, Invoice, Message, Organization, Ticket,
    TicketStats, TimeEntry, User,
};
use crate::store::{
    EntityStore, OrganizationPatch, StoreError, StoreResult, TicketFilter, TicketPatch, UserPatch,
};

mod kind {
    pub const USER: &str = "user";
    pub const ORG: &str = "org";
    pub const TICKET: &str = "ticket";
    pub const MESSAGE: &str = "message";
    pub const TIME_ENTRY: &str = "time_entry";
    pub const CONVERSION: &str = "conversion";
    pub const INVOICE: &str = "invoice";
    pub const ACTIVITY: &str = "activity";
}

/// Minimal key-value engine surface: opaque string records grouped by kind.
/// No joins, no secondary indexes, no multi-key transactions.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<String>>;
    async fn put(&self, kind: &str, id: &str, value: &str) -> Result<()>;
    async fn delete(&self, kind: &str, id: &str) -> Result<()>;
    async fn scan(&self, kind: &str) -> Result<Vec<String>>;
}

/// Redis-backed engine. Records live at `st:{kind}:{id}`; a per-kind set of
/// ids (`st:{kind}:index`) makes scans possible without KEYS.
#[derive(Clone)]
pub struct RedisKv {
    manager: redis::aio::ConnectionManager,
}

impl RedisKv {
    pub fn new(manager: redis::aio::ConnectionManager) -> Self {
        Self { manager }
    }

    fn record_key(kind: &str, id: &str) -> String {
        format!("st:{kind}:{id}")
    }

    fn index_key(kind: &str) -> String {
        format!("st:{kind}:index")
    }
}

#[async_trait]
impl KvBackend for RedisKv {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(Self::record_key(kind, id))
            .query_async(&mut conn)
            .await
            .context("Redis GET failed")?;
        Ok(value)
    }

    async fn put(&self, kind: &str, id: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(Self::record_key(kind, id))
            .arg(value)
            .query_async(&mut conn)
            .await
            .context("Redis SET failed")?;
        let _: () = redis::cmd("SADD")
            .arg(Self::index_key(kind))
            .arg(id)
            .query_async(&mut conn)
            .await
            .context("Redis SADD failed")?;
        Ok(())
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("DEL")
            .arg(Self::record_key(kind, id))
            .query_async(&mut conn)
            .await
            .context("Redis DEL failed")?;
        let _: () = redis::cmd("SREM")
            .arg(Self::index_key(kind))
            .arg(id)
            .query_async(&mut conn)
            .await
            .context("Redis SREM failed")?;
        Ok(())
    }

    async fn scan(&self, kind: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let ids: Vec<String> = redis::cmd("SMEMBERS")
            .arg(Self::index_key(kind))
            .query_async(&mut conn)
            .await
            .context("Redis SMEMBERS failed")?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("MGET");
        for id in &ids {
            cmd.arg(Self::record_key(kind, id));
        }
        let values: Vec<Option<String>> = cmd
            .query_async(&mut conn)
            .await
            .context("Redis MGET failed")?;
        Ok(values.into_iter().flatten().collect())
    }
}

/// In-process engine with the same contract as [`RedisKv`]; used by the test
/// suite so the full behavioral contract runs without external services.
#[derive(Debug, Default)]
pub struct MemoryKv {
    data: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn get(&self, kind: &str, id: &str) -> Result<Option<String>> {
        let data = self.data.read().map_err(|_| anyhow!("kv lock poisoned"))?;
        Ok(data.get(kind).and_then(|m| m.get(id)).cloned())
    }

    async fn put(&self, kind: &str, id: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().map_err(|_| anyhow!("kv lock poisoned"))?;
        data.entry(kind.to_string())
            .or_default()
            .insert(id.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<()> {
        let mut data = self.data.write().map_err(|_| anyhow!("kv lock poisoned"))?;
        if let Some(m) = data.get_mut(kind) {
            m.remove(id);
        }
        Ok(())
    }

    async fn scan(&self, kind: &str) -> Result<Vec<String>> {
        let data = self.data.read().map_err(|_| anyhow!("kv lock poisoned"))?;
        Ok(data
            .get(kind)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Key-value adapter over any [`KvBackend`]. Entities are denormalized JSON
/// records; every filter, ordering rule and "join" is reimplemented in-process
/// after a scan, mirroring the relational adapter row for row.
///
/// Compound writes (time entry + hours_worked, approval + category overwrite)
/// are read-then-write with no transaction; concurrent writers to the same
/// ticket can lose an update. Accepted limitation of this backend.
pub struct KvStore<B: KvBackend> {
    kv: B,
}

impl<B: KvBackend> KvStore<B> {
    pub fn new(kv: B) -> Self {
        Self { kv }
    }

    async fn load<T: DeserializeOwned>(&self, kind: &str, id: &str) -> StoreResult<Option<T>> {
        match self.kv.get(kind, id).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw).context("Corrupt kv record")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn load_required<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: &str,
        entity: &'static str,
    ) -> StoreResult<T> {
        self.load(kind, id).await?.ok_or(StoreError::NotFound(entity))
    }

    async fn save<T: Serialize>(&self, kind: &str, id: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value).context("Failed to encode kv record")?;
        self.kv.put(kind, id, &raw).await?;
        Ok(())
    }

    /// Create-only save: a taken id is a `Conflict` and the stored record
    /// stays as it was. Mirrors `ON CONFLICT (id) DO NOTHING` on the
    /// relational adapter.
    async fn insert<T: Serialize>(
        &self,
        kind: &str,
        id: &str,
        value: &T,
        entity: &'static str,
    ) -> StoreResult<()> {
        if self.kv.get(kind, id).await?.is_some() {
            return Err(StoreError::Conflict(entity));
        }
        self.save(kind, id, value).await
    }

    async fn load_all<T: DeserializeOwned>(&self, kind: &str) -> StoreResult<Vec<T>> {
        let mut out = Vec::new();
        for raw in self.kv.scan(kind).await? {
            out.push(serde_json::from_str(&raw).context("Corrupt kv record")?);
        }
        Ok(out)
    }

    /// Ids of all tickets belonging to an organization; the in-process stand-in
    /// for the relational JOIN on tickets.
    async fn org_ticket_ids(&self, org: &str) -> StoreResult<HashSet<String>> {
        let tickets: Vec<Ticket> = self.load_all(kind::TICKET).await?;
        Ok(tickets
            .into_iter()
            .filter(|t| t.organization_id == org)
            .map(|t| t.id)
            .collect())
    }
}

#[async_trait]
impl<B: KvBackend> EntityStore for KvStore<B> {
    async fn get_user(&self, id: &str) -> StoreResult<User> {
        self.load_required(kind::USER, id, "user").await
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let users: Vec<User> = self.load_all(kind::USER).await?;
        users
            .into_iter()
            .find(|u| u.email == email)
            .ok_or(StoreError::NotFound("user"))
    }

    async fn list_users(&self, visible_to_org: Option<&str>) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.load_all(kind::USER).await?;
        if let Some(org) = visible_to_org {
            users.retain(|u| u.organization_id.as_deref() == Some(org) || u.organization_id.is_none());
        }
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        self.insert(kind::USER, &user.id, user, "user").await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut user: User = self.load_required(kind::USER, id, "user").await?;
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        if let Some(role) = &patch.role {
            user.role = role.clone();
        }
        if let Some(avatar) = &patch.avatar {
            user.avatar = avatar.clone();
        }
        if let Some(hash) = &patch.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(org) = &patch.organization_id {
            user.organization_id = org.clone();
        }
        self.save(kind::USER, id, &user).await
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let _user: User = self.load_required(kind::USER, id, "user").await?;
        let tickets: Vec<Ticket> = self.load_all(kind::TICKET).await?;
        for mut ticket in tickets {
            if ticket.assigned_to.as_deref() == Some(id) {
                ticket.assigned_to = None;
                self.save(kind::TICKET, &ticket.id, &ticket).await?;
            }
        }
        self.kv.delete(kind::USER, id).await?;
        Ok(())
    }

    async fn get_organization(&self, id: &str) -> StoreResult<Organization> {
        self.load_required(kind::ORG, id, "organization").await
    }

    async fn list_organizations(&self, only_org: Option<&str>) -> StoreResult<Vec<Organization>> {
        let mut orgs: Vec<Organization> = self.load_all(kind::ORG).await?;
        if let Some(org) = only_org {
            orgs.retain(|o| o.id == org);
        }
        orgs.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(orgs)
    }

    async fn create_organization(&self, org: &Organization) -> StoreResult<()> {
        self.insert(kind::ORG, &org.id, org, "organization").await
    }

    async fn update_organization(&self, id: &str, patch: &OrganizationPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut org: Organization = self.load_required(kind::ORG, id, "organization").await?;
        if let Some(name) = &patch.name {
            org.name = name.clone();
        }
        if let Some(plan) = &patch.plan {
            org.plan = plan.clone();
        }
        if let Some(email) = &patch.contact_email {
            org.contact_email = email.clone();
        }
        self.save(kind::ORG, id, &org).await
    }

    async fn delete_organization(&self, id: &str) -> StoreResult<()> {
        let _org: Organization = self.load_required(kind::ORG, id, "organization").await?;
        let ticket_ids = self.org_ticket_ids(id).await?;

        let messages: Vec<Message> = self.load_all(kind::MESSAGE).await?;
        for message in messages {
            if ticket_ids.contains(&message.ticket_id) {
                self.kv.delete(kind::MESSAGE, &message.id).await?;
            }
        }
        let entries: Vec<TimeEntry> = self.load_all(kind::TIME_ENTRY).await?;
        for entry in entries {
            if ticket_ids.contains(&entry.ticket_id) {
                self.kv.delete(kind::TIME_ENTRY, &entry.id).await?;
            }
        }
        let requests: Vec<ConversionRequest> = self.load_all(kind::CONVERSION).await?;
        for request in requests {
            if ticket_ids.contains(&request.ticket_id) {
                self.kv.delete(kind::CONVERSION, &request.id).await?;
            }
        }
        for ticket_id in &ticket_ids {
            self.kv.delete(kind::TICKET, ticket_id).await?;
        }
        let invoices: Vec<Invoice> = self.load_all(kind::INVOICE).await?;
        for invoice in invoices {
            if invoice.organization_id == id {
                self.kv.delete(kind::INVOICE, &invoice.id).await?;
            }
        }
        let users: Vec<User> = self.load_all(kind::USER).await?;
        for user in users {
            if user.organization_id.as_deref() == Some(id) {
                self.kv.delete(kind::USER, &user.id).await?;
            }
        }
        self.kv.delete(kind::ORG, id).await?;
        tracing::debug!(org = %id, "cascade deleted organization");
        Ok(())
    }

    async fn get_ticket(&self, id: &str) -> StoreResult<Ticket> {
        self.load_required(kind::TICKET, id, "ticket").await
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> StoreResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self.load_all(kind::TICKET).await?;
        tickets.retain(|t| filter.matches(t));
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }

    async fn create_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        self.insert(kind::TICKET, &ticket.id, ticket, "ticket").await
    }

    async fn update_ticket(&self, id: &str, patch: &TicketPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut ticket: Ticket = self.load_required(kind::TICKET, id, "ticket").await?;
        if let Some(status) = &patch.status {
            ticket.status = status.clone();
        }
        if let Some(priority) = &patch.priority {
            ticket.priority = priority.clone();
        }
        if let Some(category) = &patch.category {
            ticket.category = category.clone();
        }
        if let Some(assignee) = &patch.assigned_to {
            ticket.assigned_to = assignee.clone();
        }
        ticket.updated_at = Utc::now();
        self.save(kind::TICKET, id, &ticket).await
    }

    async fn touch_ticket(&self, id: &str) -> StoreResult<()> {
        let mut ticket: Ticket = self.load_required(kind::TICKET, id, "ticket").await?;
        ticket.updated_at = Utc::now();
        self.save(kind::TICKET, id, &ticket).await
    }

    async fn max_ticket_number(&self) -> StoreResult<i64> {
        let tickets: Vec<Ticket> = self.load_all(kind::TICKET).await?;
        Ok(tickets
            .iter()
            .filter_map(|t| t.id.strip_prefix("TKT-"))
            .filter_map(|suffix| suffix.parse::<i64>().ok())
            .max()
            .unwrap_or(0))
    }

    async fn ticket_stats(&self, org: Option<&str>) -> StoreResult<TicketStats> {
        let tickets: Vec<Ticket> = self.load_all(kind::TICKET).await?;
        let mut stats = TicketStats::default();
        for ticket in tickets {
            if let Some(org) = org {
                if ticket.organization_id != org {
                    continue;
                }
            }
            stats.total_tickets += 1;
            match ticket.status.as_str() {
                "open" => stats.open_tickets += 1,
                "in-progress" => stats.in_progress += 1,
                "resolved" => stats.resolved += 1,
                "closed" => stats.closed += 1,
                _ => {}
            }
            stats.total_hours += ticket.hours_worked;
        }
        Ok(stats)
    }

    async fn list_messages(
        &self,
        ticket_id: &str,
        include_internal: bool,
    ) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self.load_all(kind::MESSAGE).await?;
        messages.retain(|m| m.ticket_id == ticket_id && (include_internal || !m.is_internal));
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn create_message(&self, message: &Message) -> StoreResult<()> {
        self.insert(kind::MESSAGE, &message.id, message, "message").await
    }

    async fn list_time_entries(&self, ticket_id: &str) -> StoreResult<Vec<TimeEntry>> {
        let mut entries: Vec<TimeEntry> = self.load_all(kind::TIME_ENTRY).await?;
        entries.retain(|e| e.ticket_id == ticket_id);
        entries.sort_by(|a, b| a.entry_date.cmp(&b.entry_date).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn add_time_entry(&self, entry: &TimeEntry) -> StoreResult<()> {
        // Read-then-write; no multi-key transaction on this backend.
        let mut ticket: Ticket = self
            .load_required(kind::TICKET, &entry.ticket_id, "ticket")
            .await?;
        self.save(kind::TIME_ENTRY, &entry.id, entry).await?;
        ticket.hours_worked += entry.hours;
        self.save(kind::TICKET, &entry.ticket_id, &ticket).await
    }

    async fn get_conversion_request(&self, id: &str) -> StoreResult<ConversionRequest> {
        self.load_required(kind::CONVERSION, id, "conversion request")
            .await
    }

    async fn find_conversion_for_ticket(
        &self,
        ticket_id: &str,
    ) -> StoreResult<Option<ConversionRequest>> {
        let mut requests: Vec<ConversionRequest> = self.load_all(kind::CONVERSION).await?;
        requests.retain(|r| r.ticket_id == ticket_id);
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests.into_iter().next())
    }

    async fn list_pending_conversion_requests(
        &self,
        org: Option<&str>,
    ) -> StoreResult<Vec<ConversionRequest>> {
        let mut requests: Vec<ConversionRequest> = self.load_all(kind::CONVERSION).await?;
        requests.retain(|r| r.is_pending());
        if let Some(org) = org {
            let ticket_ids = self.org_ticket_ids(org).await?;
            requests.retain(|r| ticket_ids.contains(&r.ticket_id));
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn create_conversion_request(&self, request: &ConversionRequest) -> StoreResult<()> {
        self.insert(kind::CONVERSION, &request.id, request, "conversion request")
            .await
    }

    async fn set_approval(&self, id: &str, side: ApprovalSide, status: &str) -> StoreResult<()> {
        let mut request: ConversionRequest = self
            .load_required(kind::CONVERSION, id, "conversion request")
            .await?;
        match side {
            ApprovalSide::Internal => request.internal_approval = status.to_string(),
            ApprovalSide::Client => request.client_approval = status.to_string(),
        }
        self.save(kind::CONVERSION, id, &request).await
    }

    async fn count_pending_approvals(&self, org: Option<&str>) -> StoreResult<i64> {
        let requests: Vec<ConversionRequest> = self.load_all(kind::CONVERSION).await?;
        let count = match org {
            Some(org) => {
                let ticket_ids = self.org_ticket_ids(org).await?;
                requests
                    .iter()
                    .filter(|r| {
                        ticket_ids.contains(&r.ticket_id)
                            && r.client_approval == crate::models::conversion::PENDING
                    })
                    .count()
            }
            None => requests.iter().filter(|r| r.is_pending()).count(),
        };
        Ok(count as i64)
    }

    async fn list_invoices(&self, org: Option<&str>) -> StoreResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self.load_all(kind::INVOICE).await?;
        if let Some(org) = org {
            invoices.retain(|i| i.organization_id == org);
        }
        invoices.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)).then(b.id.cmp(&a.id)));
        Ok(invoices)
    }

    async fn create_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        self.insert(kind::INVOICE, &invoice.id, invoice, "invoice").await
    }

    async fn count_invoices(&self) -> StoreResult<i64> {
        let invoices: Vec<Invoice> = self.load_all(kind::INVOICE).await?;
        Ok(invoices.len() as i64)
    }

    async fn set_invoice_status(&self, id: &str, status: &str) -> StoreResult<()> {
        let mut invoice: Invoice = self.load_required(kind::INVOICE, id, "invoice").await?;
        invoice.status = status.to_string();
        self.save(kind::INVOICE, id, &invoice).await
    }

    async fn append_activity(&self, activity: &ActivityItem) -> StoreResult<()> {
        self.save(kind::ACTIVITY, &activity.id, activity).await
    }

    async fn list_activities(
        &self,
        org: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<ActivityItem>> {
        let mut activities: Vec<ActivityItem> = self.load_all(kind::ACTIVITY).await?;
        if let Some(org) = org {
            let ticket_ids = self.org_ticket_ids(org).await?;
            activities.retain(|a| match &a.ticket_id {
                Some(ticket_id) => ticket_ids.contains(ticket_id),
                None => true,
            });
        }
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        activities.truncate(limit as usize);
        Ok(activities)
    }
}
