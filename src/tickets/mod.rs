/// Ticket lifecycle engine
///
/// Turns an inbound contact message into a tracked ticket with a unique
/// identifier, an SLA-bound due date, a threaded conversation, bounded
/// state transitions, and a one-time satisfaction rating.

pub mod lifecycle;
pub mod rating;
pub mod sequence;
pub mod service;
pub mod sla;
pub mod thread;
pub mod ticket_id;

#[cfg(test)]
mod scenarios;

pub use lifecycle::TicketStatus;
pub use rating::RatingTracker;
pub use sequence::SequenceAllocator;
pub use service::{NewTicket, TicketManager};
pub use thread::{NewAttachment, ThreadManager};
