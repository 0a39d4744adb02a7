/// Ticket creation and administration
///
/// Identifier generation is an explicit step of the creation service, not
/// a persistence-layer hook: the allocator claims a sequence before the
/// ticket row is written, so two concurrent creations can never share an
/// identifier.
use crate::{
    categories::CategoryManager,
    db::models::{Priority, Ticket},
    error::{DeskError, DeskResult},
    notify::{Notifier, TicketEvent},
    tickets::{lifecycle, sequence::SequenceAllocator, sla, ticket_id, TicketStatus},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Inbound contact message turning into a ticket
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub requester_name: String,
    pub requester_email: String,
    pub requester_mobile: Option<String>,
    pub subject: String,
    pub message: String,
    pub priority: Priority,
    pub category_id: Option<i64>,
}

/// Ticket service
#[derive(Clone)]
pub struct TicketManager {
    db: SqlitePool,
    sequence: SequenceAllocator,
    categories: Arc<CategoryManager>,
    notifier: Notifier,
}

impl TicketManager {
    pub fn new(
        db: SqlitePool,
        sequence: SequenceAllocator,
        categories: Arc<CategoryManager>,
        notifier: Notifier,
    ) -> Self {
        Self {
            db,
            sequence,
            categories,
            notifier,
        }
    }

    /// Create a ticket from an inbound contact message
    pub async fn create_ticket(&self, new: NewTicket) -> DeskResult<Ticket> {
        self.create_ticket_at(new, Utc::now()).await
    }

    /// Create a ticket with an explicit creation timestamp (imports, tests)
    pub async fn create_ticket_at(
        &self,
        new: NewTicket,
        created_at: DateTime<Utc>,
    ) -> DeskResult<Ticket> {
        Self::validate(&new)?;

        // Category SLA is read once here; the due date is frozen at
        // creation and never recomputed.
        let sla_hours = match new.category_id {
            Some(id) => self.categories.get_active(id).await?.sla_hours,
            None => None,
        };

        let seq = self.sequence.next_seq(created_at.date_naive()).await?;
        let ticket_id = ticket_id::format_ticket_id(created_at.date_naive(), seq);
        let due_date = sla::due_date(created_at, sla_hours);

        let result = sqlx::query(
            "INSERT INTO ticket (ticket_id, requester_name, requester_email, requester_mobile,
                                 subject, message, status, priority, category_id, due_date,
                                 last_activity_at, response_count, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7, ?8, ?9, ?10, 0, 0, ?10)",
        )
        .bind(&ticket_id)
        .bind(&new.requester_name)
        .bind(&new.requester_email)
        .bind(&new.requester_mobile)
        .bind(&new.subject)
        .bind(&new.message)
        .bind(new.priority.as_str())
        .bind(new.category_id)
        .bind(due_date)
        .bind(created_at)
        .execute(&self.db)
        .await?;

        let ticket = self.get(result.last_insert_rowid()).await?;

        tracing::info!(ticket_id = %ticket.ticket_id, "Ticket created");
        self.notifier.dispatch(TicketEvent::Created, ticket.clone());

        Ok(ticket)
    }

    /// Get a ticket by primary key, including tombstoned ones (audit reads)
    pub async fn get(&self, id: i64) -> DeskResult<Ticket> {
        let row = sqlx::query("SELECT * FROM ticket WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {} not found", id)))?;

        Ticket::from_row(&row)
    }

    /// Get an active (non-tombstoned) ticket by its canonical identifier
    pub async fn get_by_ticket_id(&self, ticket_id: &str) -> DeskResult<Ticket> {
        let row = sqlx::query("SELECT * FROM ticket WHERE ticket_id = ?1 AND deleted_at IS NULL")
            .bind(ticket_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {} not found", ticket_id)))?;

        Ticket::from_row(&row)
    }

    /// Public tracking lookup: the supplied email must match the
    /// requester's. A mismatch reads as not-found so the endpoint cannot
    /// be used to probe for ticket existence.
    pub async fn get_for_requester(&self, ticket_id: &str, email: &str) -> DeskResult<Ticket> {
        let ticket = self.get_by_ticket_id(ticket_id).await?;
        if !ticket.requester_email.eq_ignore_ascii_case(email) {
            return Err(DeskError::NotFound(format!("Ticket {} not found", ticket_id)));
        }
        Ok(ticket)
    }

    /// List active tickets, optionally filtered by status, newest first
    pub async fn list_active(&self, status: Option<TicketStatus>) -> DeskResult<Vec<Ticket>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM ticket WHERE deleted_at IS NULL AND status = ?1
                     ORDER BY created_at DESC",
                )
                .bind(status.as_str())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM ticket WHERE deleted_at IS NULL ORDER BY created_at DESC",
                )
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.iter().map(Ticket::from_row).collect()
    }

    /// Move a ticket along a permitted status edge.
    ///
    /// The write is a single-row compare-and-update keyed on the current
    /// status; a concurrent mutation surfaces as a conflict rather than a
    /// lost update.
    pub async fn update_status(&self, id: i64, to: TicketStatus) -> DeskResult<Ticket> {
        let ticket = self.get(id).await?;
        if ticket.deleted_at.is_some() {
            return Err(DeskError::NotFound(format!("Ticket {} not found", id)));
        }

        lifecycle::check_transition(ticket.status, to)?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE ticket
             SET status = ?1,
                 resolved_at = CASE WHEN ?1 = 'resolved' AND resolved_at IS NULL
                                    THEN ?2 ELSE resolved_at END,
                 closed_at = CASE WHEN ?1 = 'closed' THEN ?2 ELSE closed_at END,
                 last_activity_at = ?2
             WHERE id = ?3 AND status = ?4 AND deleted_at IS NULL",
        )
        .bind(to.as_str())
        .bind(now)
        .bind(id)
        .bind(ticket.status.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::Conflict(format!(
                "Ticket {} was modified concurrently",
                ticket.ticket_id
            )));
        }

        let updated = self.get(id).await?;

        tracing::info!(
            ticket_id = %updated.ticket_id,
            from = %ticket.status,
            to = %to,
            "Ticket status changed"
        );
        self.notifier.dispatch(
            TicketEvent::StatusChanged {
                from: ticket.status.as_str().to_string(),
                to: to.as_str().to_string(),
            },
            updated.clone(),
        );

        Ok(updated)
    }

    /// Assign or unassign an admin
    pub async fn assign(&self, id: i64, assigned_to: Option<&str>) -> DeskResult<Ticket> {
        let result = sqlx::query(
            "UPDATE ticket SET assigned_to = ?1, last_activity_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
        )
        .bind(assigned_to)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("Ticket {} not found", id)));
        }

        self.get(id).await
    }

    /// Change ticket priority
    pub async fn set_priority(&self, id: i64, priority: Priority) -> DeskResult<Ticket> {
        let result = sqlx::query(
            "UPDATE ticket SET priority = ?1, last_activity_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
        )
        .bind(priority.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("Ticket {} not found", id)));
        }

        self.get(id).await
    }

    /// Mark a ticket as read in the admin inbox
    pub async fn mark_read(&self, id: i64) -> DeskResult<()> {
        sqlx::query("UPDATE ticket SET is_read = 1 WHERE id = ?1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Tombstone a ticket: hidden from active listings, readable for
    /// audit. The identifier's (day, seq) claim is never released.
    pub async fn soft_delete(&self, id: i64) -> DeskResult<()> {
        let result = sqlx::query(
            "UPDATE ticket SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("Ticket {} not found", id)));
        }

        Ok(())
    }

    fn validate(new: &NewTicket) -> DeskResult<()> {
        if new.requester_name.trim().is_empty() {
            return Err(DeskError::Validation("Requester name cannot be empty".to_string()));
        }
        if !new.requester_email.contains('@') {
            return Err(DeskError::Validation("Invalid email format".to_string()));
        }
        if new.subject.trim().is_empty() {
            return Err(DeskError::Validation("Subject cannot be empty".to_string()));
        }
        if new.message.trim().is_empty() {
            return Err(DeskError::Validation("Message cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::mailer::Mailer;
    use chrono::TimeZone;

    async fn setup() -> (TicketManager, Arc<CategoryManager>) {
        let pool = test_pool().await;
        let categories = Arc::new(CategoryManager::new(pool.clone()));
        let notifier = Notifier::new(
            pool.clone(),
            Arc::new(Mailer::new(None).unwrap()),
            "http://localhost:8710".to_string(),
        );
        let tickets = TicketManager::new(
            pool.clone(),
            SequenceAllocator::new(pool),
            Arc::clone(&categories),
            notifier,
        );
        (tickets, categories)
    }

    fn new_ticket(category_id: Option<i64>) -> NewTicket {
        NewTicket {
            requester_name: "Asha Traders".to_string(),
            requester_email: "owner@ashatraders.example".to_string(),
            requester_mobile: Some("9876543210".to_string()),
            subject: "Cannot update business profile".to_string(),
            message: "The profile edit form rejects my GST number.".to_string(),
            priority: Priority::Medium,
            category_id,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_sla_due_date() {
        let (tickets, categories) = setup().await;
        let category = categories
            .create(crate::categories::CategoryInput {
                name: "Portal".to_string(),
                color: "#2563eb".to_string(),
                sla_hours: Some(24),
                display_order: 0,
            })
            .await
            .unwrap();

        let created_at = Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap();
        let ticket = tickets
            .create_ticket_at(new_ticket(Some(category.id)), created_at)
            .await
            .unwrap();

        assert_eq!(ticket.ticket_id, "TKT-20251217-0001");
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(
            ticket.due_date,
            Utc.with_ymd_and_hms(2025, 12, 18, 9, 0, 0).unwrap()
        );
        assert_eq!(ticket.response_count, 0);

        // Second ticket the same day takes the next sequence
        let second = tickets
            .create_ticket_at(new_ticket(None), created_at)
            .await
            .unwrap();
        assert_eq!(second.ticket_id, "TKT-20251217-0002");
        // No category: 48 hour default window
        assert_eq!(
            second.due_date,
            Utc.with_ymd_and_hms(2025, 12, 19, 9, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_concurrent_creations_get_distinct_ids() {
        let (tickets, _) = setup().await;
        let created_at = Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let tickets = tickets.clone();
            handles.push(tokio::spawn(async move {
                tickets.create_ticket_at(new_ticket(None), created_at).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().ticket_id);
        }

        ids.sort();
        let expected: Vec<String> = (1..=10).map(|n| format!("TKT-20251217-{:04}", n)).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_status_transitions_and_timestamps() {
        let (tickets, _) = setup().await;
        let ticket = tickets.create_ticket(new_ticket(None)).await.unwrap();

        let ticket = tickets
            .update_status(ticket.id, TicketStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::InProgress);
        assert!(ticket.resolved_at.is_none());

        let ticket = tickets
            .update_status(ticket.id, TicketStatus::Resolved)
            .await
            .unwrap();
        let resolved_at = ticket.resolved_at.expect("resolved_at set on first entry");

        let ticket = tickets
            .update_status(ticket.id, TicketStatus::Closed)
            .await
            .unwrap();
        assert!(ticket.closed_at.is_some());
        // resolved_at is set exactly once
        assert_eq!(ticket.resolved_at, Some(resolved_at));

        // closed is terminal
        let result = tickets.update_status(ticket.id, TicketStatus::InProgress).await;
        assert!(matches!(result, Err(DeskError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_invalid_edge_rejected() {
        let (tickets, _) = setup().await;
        let ticket = tickets.create_ticket(new_ticket(None)).await.unwrap();

        match tickets.update_status(ticket.id, TicketStatus::Closed).await {
            Err(DeskError::InvalidTransition { from, to }) => {
                assert_eq!(from, TicketStatus::Open);
                assert_eq!(to, TicketStatus::Closed);
            }
            other => panic!("expected InvalidTransition, got {:?}", other.map(|t| t.status)),
        }
    }

    #[tokio::test]
    async fn test_inactive_category_rejected() {
        let (tickets, categories) = setup().await;
        let category = categories
            .create(crate::categories::CategoryInput {
                name: "Legacy".to_string(),
                color: "#6b7280".to_string(),
                sla_hours: Some(24),
                display_order: 0,
            })
            .await
            .unwrap();
        categories.soft_delete(category.id).await.unwrap();

        let result = tickets.create_ticket(new_ticket(Some(category.id))).await;
        assert!(matches!(result, Err(DeskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_listing_and_tracking() {
        let (tickets, _) = setup().await;
        let ticket = tickets.create_ticket(new_ticket(None)).await.unwrap();

        tickets.soft_delete(ticket.id).await.unwrap();

        assert!(tickets.list_active(None).await.unwrap().is_empty());
        assert!(tickets.get_by_ticket_id(&ticket.ticket_id).await.is_err());
        // Still readable by primary key for audit
        let audit = tickets.get(ticket.id).await.unwrap();
        assert!(audit.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_requester_email_must_match() {
        let (tickets, _) = setup().await;
        let ticket = tickets.create_ticket(new_ticket(None)).await.unwrap();

        assert!(tickets
            .get_for_requester(&ticket.ticket_id, "OWNER@ashatraders.example")
            .await
            .is_ok());
        assert!(matches!(
            tickets
                .get_for_requester(&ticket.ticket_id, "other@example.com")
                .await,
            Err(DeskError::NotFound(_))
        ));
    }
}
