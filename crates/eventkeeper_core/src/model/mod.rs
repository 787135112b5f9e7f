//! Domain model for events and their attendees.
//!
//! # Responsibility
//! - Define the canonical `Event` and `Attendee` records owned by the store.
//! - Normalize and validate field values before an entity can exist.
//!
//! # Invariants
//! - Entities are validate-then-construct: constructors return `Result` and
//!   an invalid entity is never observable.
//! - Events reference attendees by id only; attendee values live in the
//!   store's attendee map.

pub mod attendee;
pub mod event;
pub mod validation;

/// Identifier of one event. Always strictly positive.
pub type EventId = u32;

/// Identifier of one attendee. Always strictly positive.
pub type AttendeeId = u32;
