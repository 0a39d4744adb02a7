/// One-time satisfaction ratings
///
/// A rating can be submitted once, only after the ticket reaches
/// resolved or closed, and is written in a single guarded UPDATE so no
/// reader ever observes a partially applied rating.
use crate::{
    db::models::Ticket,
    error::{DeskError, DeskResult},
    notify::{Notifier, TicketEvent},
    tickets::TicketStatus,
};
use chrono::Utc;
use sqlx::SqlitePool;

/// Satisfaction rating service
#[derive(Clone)]
pub struct RatingTracker {
    db: SqlitePool,
    notifier: Notifier,
}

impl RatingTracker {
    pub fn new(db: SqlitePool, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// Record a rating for a ticket
    pub async fn submit(
        &self,
        ticket_pk: i64,
        rating: i64,
        feedback: Option<&str>,
    ) -> DeskResult<Ticket> {
        if !(1..=5).contains(&rating) {
            return Err(DeskError::InvalidRating(rating));
        }

        let row = sqlx::query("SELECT * FROM ticket WHERE id = ?1 AND deleted_at IS NULL")
            .bind(ticket_pk)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {} not found", ticket_pk)))?;
        let ticket = Ticket::from_row(&row)?;

        if !matches!(ticket.status, TicketStatus::Resolved | TicketStatus::Closed) {
            return Err(DeskError::NotEligible);
        }
        if ticket.satisfaction_rating.is_some() {
            return Err(DeskError::AlreadyRated);
        }

        // The WHERE clause repeats both preconditions: a concurrent
        // submission that won the race leaves zero rows for this one.
        let result = sqlx::query(
            "UPDATE ticket
             SET satisfaction_rating = ?1, satisfaction_feedback = ?2, last_activity_at = ?3
             WHERE id = ?4
               AND satisfaction_rating IS NULL
               AND status IN ('resolved', 'closed')
               AND deleted_at IS NULL",
        )
        .bind(rating)
        .bind(feedback)
        .bind(Utc::now())
        .bind(ticket_pk)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::AlreadyRated);
        }

        let row = sqlx::query("SELECT * FROM ticket WHERE id = ?1")
            .bind(ticket_pk)
            .fetch_one(&self.db)
            .await?;
        let updated = Ticket::from_row(&row)?;

        tracing::info!(ticket_id = %updated.ticket_id, rating, "Satisfaction rating submitted");
        self.notifier
            .dispatch(TicketEvent::RatingSubmitted { rating }, updated.clone());

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        categories::CategoryManager,
        db::{models::Priority, test_pool},
        mailer::Mailer,
        tickets::{NewTicket, SequenceAllocator, TicketManager},
    };
    use std::sync::Arc;

    async fn setup() -> (TicketManager, RatingTracker, Ticket) {
        let pool = test_pool().await;
        let notifier = Notifier::new(
            pool.clone(),
            Arc::new(Mailer::new(None).unwrap()),
            "http://localhost:8710".to_string(),
        );
        let tickets = TicketManager::new(
            pool.clone(),
            SequenceAllocator::new(pool.clone()),
            Arc::new(CategoryManager::new(pool.clone())),
            notifier.clone(),
        );
        let ratings = RatingTracker::new(pool, notifier);

        let ticket = tickets
            .create_ticket(NewTicket {
                requester_name: "Asha Traders".to_string(),
                requester_email: "owner@ashatraders.example".to_string(),
                requester_mobile: None,
                subject: "Billing question".to_string(),
                message: "Was I charged twice?".to_string(),
                priority: Priority::Low,
                category_id: None,
            })
            .await
            .unwrap();

        (tickets, ratings, ticket)
    }

    #[tokio::test]
    async fn test_rating_requires_terminal_eligible_status() {
        let (tickets, ratings, ticket) = setup().await;

        assert!(matches!(
            ratings.submit(ticket.id, 5, None).await,
            Err(DeskError::NotEligible)
        ));

        tickets.update_status(ticket.id, TicketStatus::InProgress).await.unwrap();
        assert!(matches!(
            ratings.submit(ticket.id, 5, None).await,
            Err(DeskError::NotEligible)
        ));

        tickets.update_status(ticket.id, TicketStatus::Resolved).await.unwrap();
        let rated = ratings.submit(ticket.id, 5, Some("Quick fix, thanks")).await.unwrap();
        assert_eq!(rated.satisfaction_rating, Some(5));
        assert_eq!(rated.satisfaction_feedback.as_deref(), Some("Quick fix, thanks"));
    }

    #[tokio::test]
    async fn test_rating_exactly_once() {
        let (tickets, ratings, ticket) = setup().await;

        tickets.update_status(ticket.id, TicketStatus::InProgress).await.unwrap();
        tickets.update_status(ticket.id, TicketStatus::Resolved).await.unwrap();
        tickets.update_status(ticket.id, TicketStatus::Closed).await.unwrap();

        ratings.submit(ticket.id, 4, None).await.unwrap();

        match ratings.submit(ticket.id, 5, None).await {
            Err(DeskError::AlreadyRated) => {}
            other => panic!("expected AlreadyRated, got {:?}", other.map(|t| t.satisfaction_rating)),
        }

        // First rating untouched
        let after = tickets.get(ticket.id).await.unwrap();
        assert_eq!(after.satisfaction_rating, Some(4));
    }

    #[tokio::test]
    async fn test_rating_range_validated() {
        let (tickets, ratings, ticket) = setup().await;
        tickets.update_status(ticket.id, TicketStatus::InProgress).await.unwrap();
        tickets.update_status(ticket.id, TicketStatus::Resolved).await.unwrap();

        assert!(matches!(
            ratings.submit(ticket.id, 0, None).await,
            Err(DeskError::InvalidRating(0))
        ));
        assert!(matches!(
            ratings.submit(ticket.id, 6, None).await,
            Err(DeskError::InvalidRating(6))
        ));
    }
}
