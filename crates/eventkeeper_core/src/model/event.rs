//! Event domain model.
//!
//! # Responsibility
//! - Hold one scheduled event and the ordered ids of its attendees.
//! - Provide date classification helpers relative to a caller-supplied day.
//!
//! # Invariants
//! - `id` is strictly positive.
//! - Text fields are trimmed and non-empty.
//! - Each attendee id appears at most once in `attendee_ids`.
//! - Equality is by `id` only.

use chrono::NaiveDate;
use serde::Serialize;

use super::validation::{require_positive_id, require_text, ValidationError};
use super::{AttendeeId, EventId};

/// Validated, normalized editable fields of an event.
///
/// Built before any mutation so create and modify paths apply all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    name: String,
    date: NaiveDate,
    location: String,
    description: String,
}

impl EventDetails {
    pub fn new(
        name: &str,
        date: NaiveDate,
        location: &str,
        description: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            name: require_text("name", name)?,
            date,
            location: require_text("location", location)?,
            description: require_text("description", description)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// One scheduled event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    id: EventId,
    name: String,
    date: NaiveDate,
    location: String,
    description: String,
    attendee_ids: Vec<AttendeeId>,
}

impl Event {
    /// Builds an event with no attendees.
    pub fn new(id: EventId, details: EventDetails) -> Result<Self, ValidationError> {
        let EventDetails {
            name,
            date,
            location,
            description,
        } = details;
        Ok(Self {
            id: require_positive_id(id)?,
            name,
            date,
            location,
            description,
            attendee_ids: Vec::new(),
        })
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Attendee ids in registration order.
    pub fn attendee_ids(&self) -> &[AttendeeId] {
        &self.attendee_ids
    }

    pub fn attendee_count(&self) -> usize {
        self.attendee_ids.len()
    }

    pub fn has_attendee(&self, attendee_id: AttendeeId) -> bool {
        self.attendee_ids.contains(&attendee_id)
    }

    /// Today or later.
    pub fn is_future(&self, today: NaiveDate) -> bool {
        self.date >= today
    }

    pub fn is_past(&self, today: NaiveDate) -> bool {
        self.date < today
    }

    /// Whether this event occupies the same (name, date) slot.
    ///
    /// Names compare case-insensitively, dates exactly.
    pub fn occupies_slot(&self, name: &str, date: NaiveDate) -> bool {
        self.date == date && self.name.to_lowercase() == name.trim().to_lowercase()
    }

    pub(crate) fn apply_details(&mut self, details: EventDetails) {
        self.name = details.name;
        self.date = details.date;
        self.location = details.location;
        self.description = details.description;
    }

    /// Appends `attendee_id`; returns `false` when it is already registered.
    pub(crate) fn add_attendee(&mut self, attendee_id: AttendeeId) -> bool {
        if self.has_attendee(attendee_id) {
            return false;
        }
        self.attendee_ids.push(attendee_id);
        true
    }

    /// Removes `attendee_id`; returns `false` when it was not registered.
    pub(crate) fn remove_attendee(&mut self, attendee_id: AttendeeId) -> bool {
        let before = self.attendee_ids.len();
        self.attendee_ids.retain(|id| *id != attendee_id);
        self.attendee_ids.len() != before
    }

    pub(crate) fn retain_attendees(&mut self, mut keep: impl FnMut(AttendeeId) -> bool) {
        self.attendee_ids.retain(|id| keep(*id));
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event{{id={}, name='{}', date={}, location='{}', attendees={}}}",
            self.id,
            self.name,
            self.date,
            self.location,
            self.attendee_ids.len()
        )
    }
}
