//! Field validation rules shared by both entity types.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

use super::EventId;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Field-level or business-rule validation failure.
///
/// Always recoverable; the operation that produced it changed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Ids must be strictly positive.
    NonPositiveId,
    /// Required text field is empty after trimming.
    EmptyField(&'static str),
    /// Email does not match the accepted address shape.
    InvalidEmail(String),
    /// New events cannot be scheduled before today.
    DateInPast { date: NaiveDate, today: NaiveDate },
    /// Events whose date already passed are read-only.
    EventAlreadyPast { id: EventId, date: NaiveDate },
    /// The id counter for this entity kind cannot advance further.
    IdSpaceExhausted(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveId => write!(f, "id must be greater than 0"),
            Self::EmptyField(field) => write!(f, "{field} cannot be empty"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::DateInPast { date, today } => {
                write!(f, "event date {date} is before today ({today})")
            }
            Self::EventAlreadyPast { id, date } => {
                write!(f, "event {id} already took place on {date} and cannot be modified")
            }
            Self::IdSpaceExhausted(kind) => write!(f, "no {kind} ids left to allocate"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_positive_id(id: u32) -> Result<u32, ValidationError> {
    if id == 0 {
        return Err(ValidationError::NonPositiveId);
    }
    Ok(id)
}

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// Trims, shape-checks and lower-cases an email address.
pub(crate) fn normalize_email(value: &str) -> Result<String, ValidationError> {
    let trimmed = require_text("email", value)?;
    if !EMAIL_RE.is_match(&trimmed) {
        return Err(ValidationError::InvalidEmail(trimmed));
    }
    Ok(trimmed.to_lowercase())
}

/// Key used for case-insensitive email uniqueness checks.
pub(crate) fn email_key(value: &str) -> String {
    value.trim().to_lowercase()
}
