/// Outbound notification dispatch
///
/// The lifecycle core emits events; delivery happens on a detached task
/// and is never part of the mutation's correctness contract. A failed
/// send is logged and dropped.
use crate::{db::models::Ticket, error::DeskResult, mailer::Mailer};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Lifecycle events surfaced to the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketEvent {
    Created,
    StatusChanged { from: String, to: String },
    ResponseAdded { response_id: i64, is_internal: bool },
    RatingSubmitted { rating: i64 },
}

/// Notification dispatcher
#[derive(Clone)]
pub struct Notifier {
    db: SqlitePool,
    mailer: Arc<Mailer>,
    public_url: String,
}

impl Notifier {
    pub fn new(db: SqlitePool, mailer: Arc<Mailer>, public_url: String) -> Self {
        Self {
            db,
            mailer,
            public_url,
        }
    }

    /// Fire-and-forget dispatch of an event with a ticket snapshot
    pub fn dispatch(&self, event: TicketEvent, ticket: Ticket) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&event, &ticket).await {
                tracing::warn!(
                    ticket_id = %ticket.ticket_id,
                    event = ?event,
                    "Notification delivery failed: {}",
                    e
                );
            }
        });
    }

    async fn deliver(&self, event: &TicketEvent, ticket: &Ticket) -> DeskResult<()> {
        match event {
            TicketEvent::Created => {
                let body = format!(
                    r#"
Hello {},

Your support request has been received and assigned ticket {}.

We aim to respond by {}.

You can follow the conversation at:
{}/track/{}

Best regards,
MSME Support Desk
"#,
                    ticket.requester_name,
                    ticket.ticket_id,
                    ticket.due_date.format("%Y-%m-%d %H:%M UTC"),
                    self.public_url,
                    ticket.ticket_id,
                );
                self.mailer
                    .send(
                        &ticket.requester_email,
                        &format!("Ticket {} received", ticket.ticket_id),
                        &body,
                    )
                    .await
            }
            TicketEvent::StatusChanged { from, to } => {
                let body = format!(
                    r#"
Hello {},

The status of your ticket {} changed from {} to {}.

Best regards,
MSME Support Desk
"#,
                    ticket.requester_name, ticket.ticket_id, from, to,
                );
                self.mailer
                    .send(
                        &ticket.requester_email,
                        &format!("Ticket {} update", ticket.ticket_id),
                        &body,
                    )
                    .await
            }
            TicketEvent::ResponseAdded {
                response_id,
                is_internal,
            } => {
                // Internal notes are invisible to the requester
                if *is_internal {
                    return Ok(());
                }

                let body = format!(
                    r#"
Hello {},

A new reply was added to your ticket {}.

You can read it at:
{}/track/{}

Best regards,
MSME Support Desk
"#,
                    ticket.requester_name, ticket.ticket_id, self.public_url, ticket.ticket_id,
                );
                self.mailer
                    .send(
                        &ticket.requester_email,
                        &format!("New reply on ticket {}", ticket.ticket_id),
                        &body,
                    )
                    .await?;

                // Record dispatch on the response row; best effort only
                sqlx::query(
                    "UPDATE ticket_response SET email_sent = 1, email_sent_at = ?1 WHERE id = ?2",
                )
                .bind(Utc::now())
                .bind(response_id)
                .execute(&self.db)
                .await?;

                Ok(())
            }
            TicketEvent::RatingSubmitted { rating } => {
                tracing::info!(
                    ticket_id = %ticket.ticket_id,
                    rating,
                    "Satisfaction rating recorded"
                );
                Ok(())
            }
        }
    }
}
