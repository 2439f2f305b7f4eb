use serde::Deserialize;

use crate::models::Ticket;

/// Ticket list filters. The Postgres adapter pushes these into the query; the
/// key-value adapter applies [`TicketFilter::matches`] after a scan. Both must
/// select the same rows for the same filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub organization_id: Option<String>,
    pub assigned_to: Option<String>,
    pub search: Option<String>,
}

impl TicketFilter {
    pub fn for_organization(org_id: impl Into<String>) -> Self {
        TicketFilter {
            organization_id: Some(org_id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.category.is_none()
            && self.organization_id.is_none()
            && self.assigned_to.is_none()
            && self.search.is_none()
    }

    /// In-process equivalent of the SQL WHERE clause.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(status) = &self.status {
            if &ticket.status != status {
                return false;
            }
        }
        if let Some(priority) = &self.priority {
            if &ticket.priority != priority {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &ticket.category != category {
                return false;
            }
        }
        if let Some(org) = &self.organization_id {
            if &ticket.organization_id != org {
                return false;
            }
        }
        if let Some(assignee) = &self.assigned_to {
            if ticket.assigned_to.as_deref() != Some(assignee.as_str()) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = ticket.title.to_lowercase().contains(&needle)
                || ticket.description.to_lowercase().contains(&needle)
                || ticket.id.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ticket() -> Ticket {
        Ticket {
            id: "TKT-001".into(),
            title: "VPN outage".into(),
            description: "Site-to-site tunnel is down".into(),
            status: "open".into(),
            priority: "high".into(),
            category: "support".into(),
            organization_id: "org-a".into(),
            created_by: "user-1".into(),
            assigned_to: Some("user-2".into()),
            hours_worked: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(TicketFilter::default().matches(&ticket()));
    }

    #[test]
    fn field_filters_are_conjunctive() {
        let mut f = TicketFilter::default();
        f.status = Some("open".into());
        f.organization_id = Some("org-a".into());
        assert!(f.matches(&ticket()));

        f.priority = Some("low".into());
        assert!(!f.matches(&ticket()));
    }

    #[test]
    fn search_is_case_insensitive_over_title_description_and_id() {
        let mut f = TicketFilter::default();
        f.search = Some("TUNNEL".into());
        assert!(f.matches(&ticket()));

        f.search = Some("tkt-001".into());
        assert!(f.matches(&ticket()));

        f.search = Some("billing".into());
        assert!(!f.matches(&ticket()));
    }

    #[test]
    fn assignee_filter_skips_unassigned() {
        let mut t = ticket();
        t.assigned_to = None;
        let mut f = TicketFilter::default();
        f.assigned_to = Some("user-2".into());
        assert!(!f.matches(&t));
    }
}
