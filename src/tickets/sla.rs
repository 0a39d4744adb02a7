/// SLA due date calculation
use chrono::{DateTime, Duration, Utc};

/// Response window applied when a ticket has no category or the category
/// has no SLA configured
pub const DEFAULT_SLA_HOURS: i64 = 48;

/// Compute the first-response due date for a ticket created at `created_at`.
///
/// The category's SLA is captured here, at creation time; later edits to
/// the category never touch existing due dates. A non-positive configured
/// window is a programmer error (the category store rejects it on write).
pub fn due_date(created_at: DateTime<Utc>, sla_hours: Option<i64>) -> DateTime<Utc> {
    let hours = sla_hours.unwrap_or(DEFAULT_SLA_HOURS);
    assert!(hours > 0, "SLA window must be positive, got {}", hours);
    created_at + Duration::hours(hours)
}
