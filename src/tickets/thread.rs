/// Ticket conversation threads
///
/// Responses are append-only and strictly ordered by creation time;
/// corrections are new entries. Appending also applies the lifecycle side
/// effects (first-response stamp, reply-driven status moves) inside the
/// same transaction as the ticket-row update.
use crate::{
    db::models::{ResponderType, Ticket, TicketAttachment, TicketResponse},
    error::{DeskError, DeskResult},
    notify::{Notifier, TicketEvent},
    tickets::TicketStatus,
};
use chrono::Utc;
use sqlx::SqlitePool;

/// Attachment reference captured alongside a response. The bytes have
/// already been handed to the attachment store; only the returned
/// reference is persisted here.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub file_size: i64,
}

/// Conversation thread service
#[derive(Clone)]
pub struct ThreadManager {
    db: SqlitePool,
    notifier: Notifier,
}

impl ThreadManager {
    pub fn new(db: SqlitePool, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    /// Append a response to a ticket's thread.
    ///
    /// Validates the message and internal-note rules, advances the ticket
    /// status where the reply demands it, bumps `response_count` for
    /// non-internal entries, and stamps `first_response_at` on the first
    /// non-internal admin reply. A customer reply to a closed ticket is
    /// rejected: closed accepts no further edges.
    pub async fn append(
        &self,
        ticket_pk: i64,
        responder: ResponderType,
        responder_name: &str,
        message: &str,
        is_internal: bool,
        attachments: Vec<NewAttachment>,
    ) -> DeskResult<TicketResponse> {
        if message.trim().is_empty() {
            return Err(DeskError::Validation("Response message cannot be empty".to_string()));
        }
        if is_internal && responder != ResponderType::Admin {
            return Err(DeskError::Validation(
                "Internal notes can only be authored by admins".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query("SELECT * FROM ticket WHERE id = ?1 AND deleted_at IS NULL")
            .bind(ticket_pk)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {} not found", ticket_pk)))?;
        let ticket = Ticket::from_row(&row)?;

        let new_status = self.reply_status_effect(&ticket, responder, is_internal)?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO ticket_response (ticket_pk, responder_type, responder_name, message,
                                          is_internal_note, email_sent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        )
        .bind(ticket_pk)
        .bind(responder.as_str())
        .bind(responder_name)
        .bind(message)
        .bind(is_internal)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let response_id = result.last_insert_rowid();

        for attachment in &attachments {
            sqlx::query(
                "INSERT INTO ticket_attachment (ticket_pk, response_id, file_name, file_path,
                                                file_type, file_size, uploaded_by, uploader_type,
                                                created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(ticket_pk)
            .bind(response_id)
            .bind(&attachment.file_name)
            .bind(&attachment.file_path)
            .bind(&attachment.file_type)
            .bind(attachment.file_size)
            .bind(responder_name)
            .bind(responder.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // First non-internal admin reply is the SLA-compliance timestamp
        let first_response_at =
            if responder == ResponderType::Admin && !is_internal && ticket.first_response_at.is_none() {
                Some(now)
            } else {
                None
            };
        let count_increment: i64 = if is_internal { 0 } else { 1 };

        // Compare-and-update keyed on the status we read; a concurrent
        // mutation on the same ticket rolls this append back.
        let updated = sqlx::query(
            "UPDATE ticket
             SET status = ?1,
                 first_response_at = COALESCE(first_response_at, ?2),
                 response_count = response_count + ?3,
                 last_activity_at = ?4
             WHERE id = ?5 AND status = ?6 AND deleted_at IS NULL",
        )
        .bind(new_status.unwrap_or(ticket.status).as_str())
        .bind(first_response_at)
        .bind(count_increment)
        .bind(now)
        .bind(ticket_pk)
        .bind(ticket.status.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DeskError::Conflict(format!(
                "Ticket {} was modified concurrently",
                ticket.ticket_id
            )));
        }

        tx.commit().await?;

        let response = self.get_response(response_id).await?;
        let snapshot_row = sqlx::query("SELECT * FROM ticket WHERE id = ?1")
            .bind(ticket_pk)
            .fetch_one(&self.db)
            .await?;
        let snapshot = Ticket::from_row(&snapshot_row)?;

        if let Some(to) = new_status {
            tracing::info!(
                ticket_id = %ticket.ticket_id,
                from = %ticket.status,
                to = %to,
                "Reply moved ticket status"
            );
            self.notifier.dispatch(
                TicketEvent::StatusChanged {
                    from: ticket.status.as_str().to_string(),
                    to: to.as_str().to_string(),
                },
                snapshot.clone(),
            );
        }
        self.notifier.dispatch(
            TicketEvent::ResponseAdded {
                response_id,
                is_internal,
            },
            snapshot,
        );

        Ok(response)
    }

    /// Status edge demanded by a reply, if any
    fn reply_status_effect(
        &self,
        ticket: &Ticket,
        responder: ResponderType,
        is_internal: bool,
    ) -> DeskResult<Option<TicketStatus>> {
        match responder {
            ResponderType::Admin if !is_internal => Ok(match ticket.status {
                TicketStatus::Open | TicketStatus::AwaitingResponse => {
                    Some(TicketStatus::InProgress)
                }
                _ => None,
            }),
            ResponderType::Customer => match ticket.status {
                TicketStatus::Closed => Err(DeskError::InvalidTransition {
                    from: TicketStatus::Closed,
                    to: TicketStatus::InProgress,
                }),
                // Customer reply reopens a resolved ticket
                TicketStatus::Resolved => Ok(Some(TicketStatus::InProgress)),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// List a ticket's responses in creation order.
    ///
    /// `include_internal = false` filters internal notes for
    /// customer-facing views.
    pub async fn list(
        &self,
        ticket_pk: i64,
        include_internal: bool,
    ) -> DeskResult<Vec<TicketResponse>> {
        let rows = if include_internal {
            sqlx::query(
                "SELECT * FROM ticket_response
                 WHERE ticket_pk = ?1 AND deleted_at IS NULL
                 ORDER BY created_at, id",
            )
            .bind(ticket_pk)
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query(
                "SELECT * FROM ticket_response
                 WHERE ticket_pk = ?1 AND deleted_at IS NULL AND is_internal_note = 0
                 ORDER BY created_at, id",
            )
            .bind(ticket_pk)
            .fetch_all(&self.db)
            .await?
        };

        rows.iter().map(TicketResponse::from_row).collect()
    }

    /// List attachments for a ticket
    pub async fn list_attachments(&self, ticket_pk: i64) -> DeskResult<Vec<TicketAttachment>> {
        let rows = sqlx::query(
            "SELECT * FROM ticket_attachment WHERE ticket_pk = ?1 ORDER BY created_at, id",
        )
        .bind(ticket_pk)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(TicketAttachment::from_row).collect()
    }

    /// Soft-delete a single response (moderation); the thread itself is
    /// never reordered or edited
    pub async fn soft_delete_response(&self, response_id: i64) -> DeskResult<()> {
        let result = sqlx::query(
            "UPDATE ticket_response SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(response_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskError::NotFound(format!("Response {} not found", response_id)));
        }

        Ok(())
    }

    async fn get_response(&self, id: i64) -> DeskResult<TicketResponse> {
        let row = sqlx::query("SELECT * FROM ticket_response WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.db)
            .await?;

        TicketResponse::from_row(&row)
    }
}
