/// Row types shared across the support desk services
use crate::{
    error::{DeskError, DeskResult},
    tickets::lifecycle::TicketStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Ticket priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> DeskResult<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(DeskError::Validation(format!("Invalid priority: {}", s))),
        }
    }
}

/// Who authored a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderType {
    Admin,
    Customer,
    System,
}

impl ResponderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponderType::Admin => "admin",
            ResponderType::Customer => "customer",
            ResponderType::System => "system",
        }
    }

    pub fn from_str(s: &str) -> DeskResult<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(ResponderType::Admin),
            "customer" => Ok(ResponderType::Customer),
            "system" => Ok(ResponderType::System),
            _ => Err(DeskError::Validation(format!("Invalid responder type: {}", s))),
        }
    }
}

/// A tracked support request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    /// Canonical TKT-YYYYMMDD-NNNN identifier, assigned once at creation
    pub ticket_id: String,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_mobile: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    pub priority: Priority,
    pub category_id: Option<i64>,
    pub assigned_to: Option<String>,
    pub due_date: DateTime<Utc>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub response_count: i64,
    pub is_read: bool,
    pub satisfaction_rating: Option<i64>,
    pub satisfaction_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn from_row(row: &SqliteRow) -> DeskResult<Self> {
        Ok(Ticket {
            id: row.try_get("id")?,
            ticket_id: row.try_get("ticket_id")?,
            requester_name: row.try_get("requester_name")?,
            requester_email: row.try_get("requester_email")?,
            requester_mobile: row.try_get("requester_mobile")?,
            subject: row.try_get("subject")?,
            message: row.try_get("message")?,
            status: TicketStatus::from_str(row.try_get("status")?)?,
            priority: Priority::from_str(row.try_get("priority")?)?,
            category_id: row.try_get("category_id")?,
            assigned_to: row.try_get("assigned_to")?,
            due_date: row.try_get("due_date")?,
            first_response_at: row.try_get("first_response_at")?,
            resolved_at: row.try_get("resolved_at")?,
            closed_at: row.try_get("closed_at")?,
            last_activity_at: row.try_get("last_activity_at")?,
            response_count: row.try_get("response_count")?,
            is_read: row.try_get("is_read")?,
            satisfaction_rating: row.try_get("satisfaction_rating")?,
            satisfaction_feedback: row.try_get("satisfaction_feedback")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    /// Whether the first-response SLA has been breached at `now`
    pub fn is_sla_breached(&self, now: DateTime<Utc>) -> bool {
        match self.first_response_at {
            Some(first) => first > self.due_date,
            None => now > self.due_date,
        }
    }
}

/// Administrator-managed category reference data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCategory {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub sla_hours: Option<i64>,
    pub is_active: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TicketCategory {
    pub fn from_row(row: &SqliteRow) -> DeskResult<Self> {
        Ok(TicketCategory {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            color: row.try_get("color")?,
            sla_hours: row.try_get("sla_hours")?,
            is_active: row.try_get("is_active")?,
            display_order: row.try_get("display_order")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

/// One entry in a ticket's conversation thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketResponse {
    pub id: i64,
    pub ticket_pk: i64,
    pub responder_type: ResponderType,
    pub responder_name: String,
    pub message: String,
    pub is_internal_note: bool,
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TicketResponse {
    pub fn from_row(row: &SqliteRow) -> DeskResult<Self> {
        Ok(TicketResponse {
            id: row.try_get("id")?,
            ticket_pk: row.try_get("ticket_pk")?,
            responder_type: ResponderType::from_str(row.try_get("responder_type")?)?,
            responder_name: row.try_get("responder_name")?,
            message: row.try_get("message")?,
            is_internal_note: row.try_get("is_internal_note")?,
            email_sent: row.try_get("email_sent")?,
            email_sent_at: row.try_get("email_sent_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Stored attachment reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketAttachment {
    pub id: i64,
    pub ticket_pk: i64,
    pub response_id: Option<i64>,
    pub file_name: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub file_size: i64,
    pub uploaded_by: String,
    pub uploader_type: ResponderType,
    pub created_at: DateTime<Utc>,
}

impl TicketAttachment {
    pub fn from_row(row: &SqliteRow) -> DeskResult<Self> {
        Ok(TicketAttachment {
            id: row.try_get("id")?,
            ticket_pk: row.try_get("ticket_pk")?,
            response_id: row.try_get("response_id")?,
            file_name: row.try_get("file_name")?,
            file_path: row.try_get("file_path")?,
            file_type: row.try_get("file_type")?,
            file_size: row.try_get("file_size")?,
            uploaded_by: row.try_get("uploaded_by")?,
            uploader_type: ResponderType::from_str(row.try_get("uploader_type")?)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Portal account backing the password reset flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
