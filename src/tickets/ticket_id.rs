/// Canonical ticket identifier formatting
///
/// `TKT-YYYYMMDD-NNNN` is a durable external contract: support staff and
/// external systems key off this string, so the format must never change.
use chrono::NaiveDate;

/// Format a ticket identifier from a calendar day and a daily sequence.
///
/// The sequence is zero-padded to four digits; values beyond 9999 widen
/// without truncation. A non-positive sequence is a programmer error.
pub fn format_ticket_id(date: NaiveDate, seq: i64) -> String {
    assert!(seq > 0, "ticket sequence must be positive, got {}", seq);
    format!("TKT-{}-{:04}", date.format("%Y%m%d"), seq)
}
