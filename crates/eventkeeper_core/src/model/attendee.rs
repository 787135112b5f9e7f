//! Attendee domain model.
//!
//! # Invariants
//! - `id` is strictly positive.
//! - `name`, `email` and `phone` are trimmed and non-empty.
//! - `email` is lower-cased and matches the accepted address shape.
//! - Two attendees are equal when they share an id OR an email.

use serde::Serialize;

use super::validation::{normalize_email, require_positive_id, require_text, ValidationError};
use super::AttendeeId;

/// A person that can be registered to events.
#[derive(Debug, Clone, Serialize)]
pub struct Attendee {
    id: AttendeeId,
    name: String,
    email: String,
    phone: String,
}

impl Attendee {
    /// Validates and normalizes every field, then builds the attendee.
    pub fn new(
        id: AttendeeId,
        name: &str,
        email: &str,
        phone: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: require_positive_id(id)?,
            name: require_text("name", name)?,
            email: normalize_email(email)?,
            phone: require_text("phone", phone)?,
        })
    }

    pub fn id(&self) -> AttendeeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }
}

/// Membership tests match on either key, so an attendee re-entered with a
/// new id but a known email still counts as the same person.
impl PartialEq for Attendee {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id || self.email == other.email
    }
}

impl std::fmt::Display for Attendee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.email)
    }
}
