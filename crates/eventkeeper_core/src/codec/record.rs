//! Entity-to-record mapping.
//!
//! Attendee record: `id,name,email,phone`.
//! Event record: `id,name,date,location,description[,attendeeIds]`, where the
//! optional last field joins attendee ids with [`ID_LIST_DELIMITER`].

use chrono::NaiveDate;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

use super::{decode_line, encode_field, DATE_FORMAT, FIELD_DELIMITER, ID_LIST_DELIMITER};
use crate::model::attendee::Attendee;
use crate::model::event::{Event, EventDetails};
use crate::model::validation::ValidationError;
use crate::model::AttendeeId;

const ATTENDEE_FIELDS: usize = 4;
const EVENT_REQUIRED_FIELDS: usize = 5;
const EVENT_MAX_FIELDS: usize = 6;

/// Failure to turn one record into an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Record split into an unexpected number of fields.
    FieldCount {
        expected: &'static str,
        actual: usize,
    },
    /// Id field is not a positive integer.
    InvalidId(String),
    /// Date field does not follow `YYYY-MM-DD`.
    InvalidDate(String),
    /// Fields decoded but the entity rejected them.
    Validation(ValidationError),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCount { expected, actual } => {
                write!(f, "expected {expected} fields, found {actual}")
            }
            Self::InvalidId(value) => write!(f, "invalid id `{value}`"),
            Self::InvalidDate(value) => write!(f, "invalid date `{value}`, expected YYYY-MM-DD"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for DecodeError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Decoded event row before attendee references are resolved.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Event with an empty attendee list.
    pub event: Event,
    /// Attendee ids embedded in the row, deduplicated, in stored order.
    pub attendee_ids: Vec<AttendeeId>,
}

pub fn attendee_to_record(attendee: &Attendee) -> String {
    join_fields(&[
        attendee.id().to_string(),
        encode_field(Some(attendee.name())),
        encode_field(Some(attendee.email())),
        encode_field(Some(attendee.phone())),
    ])
}

pub fn decode_attendee(line: &str) -> Result<Attendee, DecodeError> {
    let fields = decode_line(line);
    if fields.len() != ATTENDEE_FIELDS {
        return Err(DecodeError::FieldCount {
            expected: "4",
            actual: fields.len(),
        });
    }

    let id = parse_id(&fields[0])?;
    Ok(Attendee::new(id, &fields[1], &fields[2], &fields[3])?)
}

/// Always writes the attendee-id field, empty when nobody is registered.
pub fn event_to_record(event: &Event) -> String {
    let ids = event
        .attendee_ids()
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(&ID_LIST_DELIMITER.to_string());

    join_fields(&[
        event.id().to_string(),
        encode_field(Some(event.name())),
        event.date().format(DATE_FORMAT).to_string(),
        encode_field(Some(event.location())),
        encode_field(Some(event.description())),
        ids,
    ])
}

pub fn decode_event(line: &str) -> Result<EventRecord, DecodeError> {
    let fields = decode_line(line);
    if !(EVENT_REQUIRED_FIELDS..=EVENT_MAX_FIELDS).contains(&fields.len()) {
        return Err(DecodeError::FieldCount {
            expected: "5 or 6",
            actual: fields.len(),
        });
    }

    let id = parse_id(&fields[0])?;
    let date = parse_date(&fields[2])?;
    let details = EventDetails::new(&fields[1], date, &fields[3], &fields[4])?;
    let event = Event::new(id, details)?;

    let attendee_ids = match fields.get(5) {
        Some(raw) => parse_id_list(id, raw),
        None => Vec::new(),
    };

    Ok(EventRecord {
        event,
        attendee_ids,
    })
}

pub fn parse_date(value: &str) -> Result<NaiveDate, DecodeError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| DecodeError::InvalidDate(value.to_string()))
}

fn parse_id(value: &str) -> Result<u32, DecodeError> {
    match value.trim().parse::<u32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(DecodeError::InvalidId(value.to_string())),
    }
}

/// Bad entries are logged and dropped; the rest of the row still loads.
fn parse_id_list(event_id: u32, raw: &str) -> Vec<AttendeeId> {
    let mut ids: Vec<AttendeeId> = Vec::new();
    for part in raw.split(ID_LIST_DELIMITER) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match parse_id(part) {
            Ok(id) if ids.contains(&id) => {
                warn!(
                    "event=record_decode module=codec status=skip event_id={} attendee_id={} reason=repeated_attendee",
                    event_id, id
                );
            }
            Ok(id) => ids.push(id),
            Err(err) => {
                warn!(
                    "event=record_decode module=codec status=skip event_id={} reason=invalid_attendee_id error={}",
                    event_id, err
                );
            }
        }
    }
    ids
}

fn join_fields(fields: &[String]) -> String {
    fields.join(&FIELD_DELIMITER.to_string())
}
