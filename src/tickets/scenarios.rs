//! Full ticket journeys exercised against the real schema, from intake
//! through resolution, rating, and the password reset flow.
use crate::{
    auth::{AccountManager, TokenFlow},
    categories::{CategoryInput, CategoryManager},
    db::{models::Priority, models::ResponderType, test_pool},
    error::DeskError,
    mailer::Mailer,
    notify::Notifier,
    tickets::{
        NewTicket, RatingTracker, SequenceAllocator, ThreadManager, TicketManager, TicketStatus,
    },
};
use chrono::{TimeZone, Utc};
use std::sync::Arc;

struct Desk {
    categories: Arc<CategoryManager>,
    tickets: TicketManager,
    thread: ThreadManager,
    ratings: RatingTracker,
}

async fn desk() -> Desk {
    let pool = test_pool().await;
    let categories = Arc::new(CategoryManager::new(pool.clone()));
    let notifier = Notifier::new(
        pool.clone(),
        Arc::new(Mailer::new(None).unwrap()),
        "http://localhost:8710".to_string(),
    );
    let tickets = TicketManager::new(
        pool.clone(),
        SequenceAllocator::new(pool.clone()),
        Arc::clone(&categories),
        notifier.clone(),
    );
    let thread = ThreadManager::new(pool.clone(), notifier.clone());
    let ratings = RatingTracker::new(pool, notifier);

    Desk {
        categories,
        tickets,
        thread,
        ratings,
    }
}

fn intake() -> NewTicket {
    NewTicket {
        requester_name: "Asha Traders".to_string(),
        requester_email: "owner@ashatraders.example".to_string(),
        requester_mobile: None,
        subject: "Payment captured twice".to_string(),
        message: "Order 1182 shows two captures for one invoice.".to_string(),
        priority: Priority::High,
        category_id: None,
    }
}

#[tokio::test]
async fn ticket_journey_from_intake_to_rating() {
    let desk = desk().await;
    let billing = desk
        .categories
        .create(CategoryInput {
            name: "Billing".to_string(),
            color: "#dc2626".to_string(),
            sla_hours: Some(24),
            display_order: 0,
        })
        .await
        .unwrap();

    let created_at = Utc.with_ymd_and_hms(2025, 12, 17, 9, 0, 0).unwrap();

    let mut new = intake();
    new.category_id = Some(billing.id);
    let ticket = desk.tickets.create_ticket_at(new, created_at).await.unwrap();
    assert_eq!(ticket.ticket_id, "TKT-20251217-0001");
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(
        ticket.due_date,
        Utc.with_ymd_and_hms(2025, 12, 18, 9, 0, 0).unwrap()
    );

    let second = desk.tickets.create_ticket_at(intake(), created_at).await.unwrap();
    assert_eq!(second.ticket_id, "TKT-20251217-0002");

    // Staff reply moves the ticket into progress and stamps the SLA clock
    desk.thread
        .append(
            ticket.id,
            ResponderType::Admin,
            "Priya",
            "Looking into the duplicate capture now.",
            false,
            Vec::new(),
        )
        .await
        .unwrap();

    let after_reply = desk.tickets.get(ticket.id).await.unwrap();
    assert_eq!(after_reply.status, TicketStatus::InProgress);
    assert!(after_reply.first_response_at.is_some());
    assert_eq!(after_reply.response_count, 1);

    let resolved = desk
        .tickets
        .update_status(ticket.id, TicketStatus::Resolved)
        .await
        .unwrap();
    assert!(resolved.resolved_at.is_some());

    let closed = desk
        .tickets
        .update_status(ticket.id, TicketStatus::Closed)
        .await
        .unwrap();
    assert!(closed.closed_at.is_some());

    // Closed accepts no further conversation from the customer
    let reply_after_close = desk
        .thread
        .append(
            ticket.id,
            ResponderType::Customer,
            "Asha Traders",
            "One more thing...",
            false,
            Vec::new(),
        )
        .await;
    assert!(matches!(
        reply_after_close,
        Err(DeskError::InvalidTransition { .. })
    ));

    // Rating lands exactly once
    let rated = desk.ratings.submit(ticket.id, 5, Some("Sorted quickly")).await.unwrap();
    assert_eq!(rated.satisfaction_rating, Some(5));
    assert!(matches!(
        desk.ratings.submit(ticket.id, 3, None).await,
        Err(DeskError::AlreadyRated)
    ));
}

#[tokio::test]
async fn customer_reply_reopens_resolved_ticket() {
    let desk = desk().await;
    let ticket = desk.tickets.create_ticket(intake()).await.unwrap();

    desk.tickets.update_status(ticket.id, TicketStatus::InProgress).await.unwrap();
    desk.tickets.update_status(ticket.id, TicketStatus::Resolved).await.unwrap();

    desk.thread
        .append(
            ticket.id,
            ResponderType::Customer,
            "Asha Traders",
            "The second capture is still showing.",
            false,
            Vec::new(),
        )
        .await
        .unwrap();

    let reopened = desk.tickets.get(ticket.id).await.unwrap();
    assert_eq!(reopened.status, TicketStatus::InProgress);
    // Reopening never clears the original resolution timestamp
    assert!(reopened.resolved_at.is_some());
}

#[tokio::test]
async fn otp_verifies_once_and_rejects_replay() {
    let pool = test_pool().await;
    let accounts = Arc::new(AccountManager::new(pool.clone()));
    accounts
        .register("owner@ashatraders.example", "original pass")
        .await
        .unwrap();
    let tokens = TokenFlow::new(pool, accounts);

    let code = tokens
        .request_reset("owner@ashatraders.example")
        .await
        .unwrap()
        .unwrap();

    tokens
        .verify_otp("owner@ashatraders.example", &code)
        .await
        .unwrap();
    assert!(matches!(
        tokens.verify_otp("owner@ashatraders.example", &code).await,
        Err(DeskError::TokenAlreadyConsumed)
    ));
}
