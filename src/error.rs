/// Unified error types for the support desk core
use crate::tickets::lifecycle::TicketStatus;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the support desk
#[derive(Error, Debug)]
pub enum DeskError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Daily sequence contention exhausted its retry budget
    #[error("Ticket sequence allocation conflict, please retry")]
    AllocationConflict,

    /// Requested status edge is not in the permitted transition table
    #[error("Invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    /// Rating submitted before the ticket reached a terminal-eligible status
    #[error("Ticket is not eligible for a satisfaction rating")]
    NotEligible,

    /// Rating already recorded for this ticket
    #[error("Ticket has already been rated")]
    AlreadyRated,

    /// Rating outside the 1..=5 range
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),

    /// Single-use token missing or secret mismatch
    #[error("Token verification failed")]
    VerificationFailed,

    /// Single-use token past its expiry window
    #[error("Token has expired")]
    TokenExpired,

    /// Single-use token already consumed
    #[error("Token has already been used")]
    TokenAlreadyConsumed,

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., concurrent ticket mutation)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Email delivery errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert DeskError to HTTP response
impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            DeskError::Validation(_) | DeskError::InvalidRating(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            DeskError::InvalidTransition { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "InvalidTransition", self.to_string())
            }
            DeskError::NotEligible => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NotEligible", self.to_string())
            }
            DeskError::AlreadyRated => {
                (StatusCode::CONFLICT, "AlreadyRated", self.to_string())
            }
            // Token failures are reported uniformly so callers cannot probe
            // which stage rejected the code.
            DeskError::VerificationFailed
            | DeskError::TokenExpired
            | DeskError::TokenAlreadyConsumed => (
                StatusCode::BAD_REQUEST,
                "InvalidToken",
                "Invalid or expired code".to_string(),
            ),
            DeskError::Authentication(_) => {
                (StatusCode::UNAUTHORIZED, "AuthenticationRequired", self.to_string())
            }
            DeskError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            DeskError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            DeskError::AllocationConflict => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AllocationConflict",
                self.to_string(),
            ),
            DeskError::Database(_)
            | DeskError::Internal(_)
            | DeskError::Io(_)
            | DeskError::Mail(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for support desk operations
pub type DeskResult<T> = Result<T, DeskError>;
