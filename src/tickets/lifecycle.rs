/// Ticket status state machine
///
/// All status writes in the system go through this table; no other code
/// path assigns a status directly.
use crate::error::{DeskError, DeskResult};
use serde::{Deserialize, Serialize};

/// Ticket lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    AwaitingResponse,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::AwaitingResponse => "awaiting_response",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> DeskResult<Self> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "awaiting_response" => Ok(TicketStatus::AwaitingResponse),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(DeskError::Validation(format!("Invalid ticket status: {}", s))),
        }
    }

    /// Whether `self -> to` is a permitted edge.
    ///
    /// open -> in_progress -> awaiting_response -> resolved -> closed,
    /// with awaiting_response returning to in_progress on an admin reply
    /// and resolved reopening to in_progress on a customer reply.
    /// `closed` is terminal.
    pub fn can_transition_to(&self, to: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (*self, to),
            (Open, InProgress)
                | (InProgress, AwaitingResponse)
                | (InProgress, Resolved)
                | (AwaitingResponse, InProgress)
                | (AwaitingResponse, Resolved)
                | (Resolved, InProgress)
                | (Resolved, Closed)
        )
    }

    /// No further status edges are permitted from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Closed)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a requested transition, rejecting anything outside the table
pub fn check_transition(from: TicketStatus, to: TicketStatus) -> DeskResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(DeskError::InvalidTransition { from, to })
    }
}
