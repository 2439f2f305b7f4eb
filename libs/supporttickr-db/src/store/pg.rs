use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{
    ActivityItem, ApprovalSide, ConversionRequest, Invoice, Message, Organization, Ticket,
    TicketStats, TimeEntry, User,
};
use crate::store::{
    EntityStore, OrganizationPatch, StoreError, StoreResult, TicketFilter, TicketPatch, UserPatch,
};

/// Relational adapter. Filters, ordering and aggregates are pushed into SQL;
/// compound writes run inside transactions.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn required<T>(row: Option<T>, entity: &'static str) -> StoreResult<T> {
        row.ok_or(StoreError::NotFound(entity))
    }

    fn affected(result: sqlx::postgres::PgQueryResult, entity: &'static str) -> StoreResult<()> {
        if result.rows_affected() == 0 {
            Err(StoreError::NotFound(entity))
        } else {
            Ok(())
        }
    }

    /// For inserts with `ON CONFLICT (id) DO NOTHING`: zero affected rows
    /// means the id was already taken.
    fn created(result: sqlx::postgres::PgQueryResult, entity: &'static str) -> StoreResult<()> {
        if result.rows_affected() == 0 {
            Err(StoreError::Conflict(entity))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn get_user(&self, id: &str) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by id")?;
        Self::required(row, "user")
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;
        Self::required(row, "user")
    }

    async fn list_users(&self, visible_to_org: Option<&str>) -> StoreResult<Vec<User>> {
        let users = match visible_to_org {
            Some(org) => {
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users WHERE organization_id = $1 OR organization_id IS NULL ORDER BY name, id",
                )
                .bind(org)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name, id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to list users")?;
        Ok(users)
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, organization_id, avatar)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.organization_id)
        .bind(&user.avatar)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;
        Self::created(result, "user")
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<()> {
        let mut clauses: Vec<String> = Vec::new();
        let mut idx = 1;
        if patch.name.is_some() {
            clauses.push(format!("name = ${idx}"));
            idx += 1;
        }
        if patch.email.is_some() {
            clauses.push(format!("email = ${idx}"));
            idx += 1;
        }
        if patch.role.is_some() {
            clauses.push(format!("role = ${idx}"));
            idx += 1;
        }
        if patch.avatar.is_some() {
            clauses.push(format!("avatar = ${idx}"));
            idx += 1;
        }
        if patch.password_hash.is_some() {
            clauses.push(format!("password_hash = ${idx}"));
            idx += 1;
        }
        match &patch.organization_id {
            Some(Some(_)) => {
                clauses.push(format!("organization_id = ${idx}"));
                idx += 1;
            }
            Some(None) => clauses.push("organization_id = NULL".to_string()),
            None => {}
        }
        if clauses.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "UPDATE users SET {} WHERE id = ${}",
            clauses.join(", "),
            idx
        );
        let mut query = sqlx::query(&sql);
        if let Some(name) = &patch.name {
            query = query.bind(name);
        }
        if let Some(email) = &patch.email {
            query = query.bind(email);
        }
        if let Some(role) = &patch.role {
            query = query.bind(role);
        }
        if let Some(avatar) = &patch.avatar {
            query = query.bind(avatar);
        }
        if let Some(hash) = &patch.password_hash {
            query = query.bind(hash);
        }
        if let Some(Some(org)) = &patch.organization_id {
            query = query.bind(org);
        }
        let result = query
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user")?;
        Self::affected(result, "user")
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        sqlx::query("UPDATE tickets SET assigned_to = NULL WHERE assigned_to = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to unassign tickets")?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user")?;
        tx.commit().await.context("Failed to commit user delete")?;
        Self::affected(result, "user")
    }

    async fn get_organization(&self, id: &str) -> StoreResult<Organization> {
        let row = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch organization")?;
        Self::required(row, "organization")
    }

    async fn list_organizations(&self, only_org: Option<&str>) -> StoreResult<Vec<Organization>> {
        let orgs = match only_org {
            Some(org) => {
                sqlx::query_as::<_, Organization>(
                    "SELECT * FROM organizations WHERE id = $1 ORDER BY name, id",
                )
                .bind(org)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Organization>("SELECT * FROM organizations ORDER BY name, id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to list organizations")?;
        Ok(orgs)
    }

    async fn create_organization(&self, org: &Organization) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO organizations (id, name, plan, contact_email, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.plan)
        .bind(&org.contact_email)
        .bind(org.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create organization")?;
        Self::created(result, "organization")
    }

    async fn update_organization(&self, id: &str, patch: &OrganizationPatch) -> StoreResult<()> {
        let mut clauses: Vec<String> = Vec::new();
        let mut idx = 1;
        if patch.name.is_some() {
            clauses.push(format!("name = ${idx}"));
            idx += 1;
        }
        if patch.plan.is_some() {
            clauses.push(format!("plan = ${idx}"));
            idx += 1;
        }
        if patch.contact_email.is_some() {
            clauses.push(format!("contact_email = ${idx}"));
            idx += 1;
        }
        if clauses.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "UPDATE organizations SET {} WHERE id = ${}",
            clauses.join(", "),
            idx
        );
        let mut query = sqlx::query(&sql);
        if let Some(name) = &patch.name {
            query = query.bind(name);
        }
        if let Some(plan) = &patch.plan {
            query = query.bind(plan);
        }
        if let Some(email) = &patch.contact_email {
            query = query.bind(email);
        }
        let result = query
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update organization")?;
        Self::affected(result, "organization")
    }

    async fn delete_organization(&self, id: &str) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        for sql in [
            "DELETE FROM time_entries WHERE ticket_id IN (SELECT id FROM tickets WHERE organization_id = $1)",
            "DELETE FROM messages WHERE ticket_id IN (SELECT id FROM tickets WHERE organization_id = $1)",
            "DELETE FROM conversion_requests WHERE ticket_id IN (SELECT id FROM tickets WHERE organization_id = $1)",
            "DELETE FROM tickets WHERE organization_id = $1",
            "DELETE FROM invoices WHERE organization_id = $1",
            "DELETE FROM users WHERE organization_id = $1",
        ] {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to cascade organization delete")?;
        }
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete organization")?;
        tx.commit()
            .await
            .context("Failed to commit organization delete")?;
        tracing::debug!(org = %id, "cascade deleted organization");
        Self::affected(result, "organization")
    }

    async fn get_ticket(&self, id: &str) -> StoreResult<Ticket> {
        let row = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch ticket")?;
        Self::required(row, "ticket")
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> StoreResult<Vec<Ticket>> {
        let mut sql = String::from("SELECT * FROM tickets WHERE 1=1");
        let mut idx = 1;
        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ${idx}"));
            idx += 1;
        }
        if filter.priority.is_some() {
            sql.push_str(&format!(" AND priority = ${idx}"));
            idx += 1;
        }
        if filter.category.is_some() {
            sql.push_str(&format!(" AND category = ${idx}"));
            idx += 1;
        }
        if filter.organization_id.is_some() {
            sql.push_str(&format!(" AND organization_id = ${idx}"));
            idx += 1;
        }
        if filter.assigned_to.is_some() {
            sql.push_str(&format!(" AND assigned_to = ${idx}"));
            idx += 1;
        }
        if filter.search.is_some() {
            sql.push_str(&format!(
                " AND (title ILIKE ${idx} OR description ILIKE ${idx} OR id ILIKE ${idx})"
            ));
        }
        // id tie-break keeps equal-timestamp rows in the same order as the
        // key-value adapter.
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query_as::<_, Ticket>(&sql);
        if let Some(status) = &filter.status {
            query = query.bind(status);
        }
        if let Some(priority) = &filter.priority {
            query = query.bind(priority);
        }
        if let Some(category) = &filter.category {
            query = query.bind(category);
        }
        if let Some(org) = &filter.organization_id {
            query = query.bind(org);
        }
        if let Some(assignee) = &filter.assigned_to {
            query = query.bind(assignee);
        }
        if let Some(search) = &filter.search {
            query = query.bind(format!("%{search}%"));
        }
        let tickets = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tickets")?;
        Ok(tickets)
    }

    async fn create_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO tickets (id, title, description, status, priority, category,
                organization_id, created_by, assigned_to, hours_worked, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&ticket.id)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(&ticket.status)
        .bind(&ticket.priority)
        .bind(&ticket.category)
        .bind(&ticket.organization_id)
        .bind(&ticket.created_by)
        .bind(&ticket.assigned_to)
        .bind(ticket.hours_worked)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create ticket")?;
        Self::created(result, "ticket")
    }

    async fn update_ticket(&self, id: &str, patch: &TicketPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut clauses: Vec<String> = Vec::new();
        let mut idx = 1;
        if patch.status.is_some() {
            clauses.push(format!("status = ${idx}"));
            idx += 1;
        }
        if patch.priority.is_some() {
            clauses.push(format!("priority = ${idx}"));
            idx += 1;
        }
        if patch.category.is_some() {
            clauses.push(format!("category = ${idx}"));
            idx += 1;
        }
        match &patch.assigned_to {
            Some(Some(_)) => {
                clauses.push(format!("assigned_to = ${idx}"));
                idx += 1;
            }
            Some(None) => clauses.push("assigned_to = NULL".to_string()),
            None => {}
        }
        clauses.push("updated_at = NOW()".to_string());

        let sql = format!(
            "UPDATE tickets SET {} WHERE id = ${}",
            clauses.join(", "),
            idx
        );
        let mut query = sqlx::query(&sql);
        if let Some(status) = &patch.status {
            query = query.bind(status);
        }
        if let Some(priority) = &patch.priority {
            query = query.bind(priority);
        }
        if let Some(category) = &patch.category {
            query = query.bind(category);
        }
        if let Some(Some(assignee)) = &patch.assigned_to {
            query = query.bind(assignee);
        }
        let result = query
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update ticket")?;
        Self::affected(result, "ticket")
    }

    async fn touch_ticket(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE tickets SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to touch ticket")?;
        Self::affected(result, "ticket")
    }

    async fn max_ticket_number(&self) -> StoreResult<i64> {
        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(SUBSTRING(id FROM 'TKT-([0-9]+)')::bigint), 0) FROM tickets",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to read max ticket number")?;
        Ok(max)
    }

    async fn ticket_stats(&self, org: Option<&str>) -> StoreResult<TicketStats> {
        let sql = |where_clause: &str| {
            format!(
                "SELECT COUNT(*) AS total_tickets,
                        COUNT(*) FILTER (WHERE status = 'open') AS open_tickets,
                        COUNT(*) FILTER (WHERE status = 'in-progress') AS in_progress,
                        COUNT(*) FILTER (WHERE status = 'resolved') AS resolved,
                        COUNT(*) FILTER (WHERE status = 'closed') AS closed,
                        COALESCE(SUM(hours_worked), 0)::float8 AS total_hours
                 FROM tickets{where_clause}"
            )
        };
        let stats = match org {
            Some(org) => {
                sqlx::query_as::<_, TicketStats>(&sql(" WHERE organization_id = $1"))
                    .bind(org)
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, TicketStats>(&sql(""))
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .context("Failed to compute ticket stats")?;
        Ok(stats)
    }

    async fn list_messages(
        &self,
        ticket_id: &str,
        include_internal: bool,
    ) -> StoreResult<Vec<Message>> {
        let mut sql = String::from("SELECT * FROM messages WHERE ticket_id = $1");
        if !include_internal {
            sql.push_str(" AND is_internal = FALSE");
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list messages")?;
        Ok(messages)
    }

    async fn create_message(&self, message: &Message) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO messages (id, ticket_id, user_id, content, is_internal, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&message.id)
        .bind(&message.ticket_id)
        .bind(&message.user_id)
        .bind(&message.content)
        .bind(message.is_internal)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create message")?;
        Self::created(result, "message")
    }

    async fn list_time_entries(&self, ticket_id: &str) -> StoreResult<Vec<TimeEntry>> {
        let entries = sqlx::query_as::<_, TimeEntry>(
            "SELECT * FROM time_entries WHERE ticket_id = $1 ORDER BY entry_date ASC, id ASC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list time entries")?;
        Ok(entries)
    }

    async fn add_time_entry(&self, entry: &TimeEntry) -> StoreResult<()> {
        // Insert and hours_worked increment are one transaction so the derived
        // total can never drift from the entries.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM tickets WHERE id = $1 FOR UPDATE")
                .bind(&entry.ticket_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to lock ticket")?;
        if exists.is_none() {
            return Err(StoreError::NotFound("ticket"));
        }
        sqlx::query(
            "INSERT INTO time_entries (id, ticket_id, user_id, hours, description, entry_date, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&entry.id)
        .bind(&entry.ticket_id)
        .bind(&entry.user_id)
        .bind(entry.hours)
        .bind(&entry.description)
        .bind(entry.entry_date)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert time entry")?;
        sqlx::query("UPDATE tickets SET hours_worked = hours_worked + $1 WHERE id = $2")
            .bind(entry.hours)
            .bind(&entry.ticket_id)
            .execute(&mut *tx)
            .await
            .context("Failed to increment hours_worked")?;
        tx.commit().await.context("Failed to commit time entry")?;
        Ok(())
    }

    async fn get_conversion_request(&self, id: &str) -> StoreResult<ConversionRequest> {
        let row = sqlx::query_as::<_, ConversionRequest>(
            "SELECT * FROM conversion_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conversion request")?;
        Self::required(row, "conversion request")
    }

    async fn find_conversion_for_ticket(
        &self,
        ticket_id: &str,
    ) -> StoreResult<Option<ConversionRequest>> {
        let row = sqlx::query_as::<_, ConversionRequest>(
            "SELECT * FROM conversion_requests WHERE ticket_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conversion request for ticket")?;
        Ok(row)
    }

    async fn list_pending_conversion_requests(
        &self,
        org: Option<&str>,
    ) -> StoreResult<Vec<ConversionRequest>> {
        const COLS: &str = "cr.id, cr.ticket_id, cr.proposed_type, cr.reason, \
                            cr.internal_approval, cr.client_approval, cr.proposed_by, cr.created_at";
        let requests = match org {
            Some(org) => {
                let sql = format!(
                    "SELECT {COLS} FROM conversion_requests cr
                     JOIN tickets t ON t.id = cr.ticket_id
                     WHERE t.organization_id = $1
                       AND (cr.internal_approval = 'pending' OR cr.client_approval = 'pending')
                     ORDER BY cr.created_at DESC, cr.id DESC"
                );
                sqlx::query_as::<_, ConversionRequest>(&sql)
                    .bind(org)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {COLS} FROM conversion_requests cr
                     WHERE cr.internal_approval = 'pending' OR cr.client_approval = 'pending'
                     ORDER BY cr.created_at DESC, cr.id DESC"
                );
                sqlx::query_as::<_, ConversionRequest>(&sql)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to list pending conversion requests")?;
        Ok(requests)
    }

    async fn create_conversion_request(&self, request: &ConversionRequest) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO conversion_requests
                (id, ticket_id, proposed_type, reason, internal_approval, client_approval, proposed_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&request.id)
        .bind(&request.ticket_id)
        .bind(&request.proposed_type)
        .bind(&request.reason)
        .bind(&request.internal_approval)
        .bind(&request.client_approval)
        .bind(&request.proposed_by)
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create conversion request")?;
        Self::created(result, "conversion request")
    }

    async fn set_approval(&self, id: &str, side: ApprovalSide, status: &str) -> StoreResult<()> {
        let sql = match side {
            ApprovalSide::Internal => {
                "UPDATE conversion_requests SET internal_approval = $1 WHERE id = $2"
            }
            ApprovalSide::Client => {
                "UPDATE conversion_requests SET client_approval = $1 WHERE id = $2"
            }
        };
        let result = sqlx::query(sql)
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to set approval")?;
        Self::affected(result, "conversion request")
    }

    async fn count_pending_approvals(&self, org: Option<&str>) -> StoreResult<i64> {
        let count: i64 = match org {
            Some(org) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM conversion_requests cr
                     JOIN tickets t ON t.id = cr.ticket_id
                     WHERE t.organization_id = $1 AND cr.client_approval = 'pending'",
                )
                .bind(org)
                .fetch_one(&self.pool)
                .await
            }
            None => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM conversion_requests
                     WHERE internal_approval = 'pending' OR client_approval = 'pending'",
                )
                .fetch_one(&self.pool)
                .await
            }
        }
        .context("Failed to count pending approvals")?;
        Ok(count)
    }

    async fn list_invoices(&self, org: Option<&str>) -> StoreResult<Vec<Invoice>> {
        let invoices = match org {
            Some(org) => {
                sqlx::query_as::<_, Invoice>(
                    "SELECT * FROM invoices WHERE organization_id = $1 ORDER BY year DESC, month DESC, id DESC",
                )
                .bind(org)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Invoice>(
                    "SELECT * FROM invoices ORDER BY year DESC, month DESC, id DESC",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list invoices")?;
        Ok(invoices)
    }

    async fn create_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO invoices
                (id, organization_id, month, year, tickets_closed, total_hours, rate_per_hour, total_amount, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&invoice.id)
        .bind(&invoice.organization_id)
        .bind(invoice.month)
        .bind(invoice.year)
        .bind(invoice.tickets_closed)
        .bind(invoice.total_hours)
        .bind(invoice.rate_per_hour)
        .bind(invoice.total_amount)
        .bind(&invoice.status)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to create invoice")?;
        Self::created(result, "invoice")
    }

    async fn count_invoices(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count invoices")?;
        Ok(count)
    }

    async fn set_invoice_status(&self, id: &str, status: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE invoices SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update invoice status")?;
        Self::affected(result, "invoice")
    }

    async fn append_activity(&self, activity: &ActivityItem) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO activities (id, type, description, user_id, ticket_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&activity.id)
        .bind(&activity.kind)
        .bind(&activity.description)
        .bind(&activity.user_id)
        .bind(&activity.ticket_id)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to append activity")?;
        Ok(())
    }

    async fn list_activities(
        &self,
        org: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<ActivityItem>> {
        let activities = match org {
            Some(org) => {
                sqlx::query_as::<_, ActivityItem>(
                    "SELECT a.id, a.type, a.description, a.user_id, a.ticket_id, a.created_at
                     FROM activities a
                     LEFT JOIN tickets t ON t.id = a.ticket_id
                     WHERE t.organization_id = $1 OR a.ticket_id IS NULL
                     ORDER BY a.created_at DESC, a.id DESC LIMIT $2",
                )
                .bind(org)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ActivityItem>(
                    "SELECT * FROM activities ORDER BY created_at DESC, id DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list activities")?;
        Ok(activities)
    }
}
