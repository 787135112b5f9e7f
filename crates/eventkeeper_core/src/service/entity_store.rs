//! Authoritative in-memory store for events and attendees.
//!
//! # Responsibility
//! - Own id-keyed maps of both entity types and allocate ids.
//! - Enforce uniqueness, date and membership rules on every mutation.
//! - Persist the full dataset after each successful mutation.
//!
//! # Invariants
//! - Ids are positive, unique per type and never reused; counters are
//!   reseeded to `max(id) + 1` on open.
//! - No two events share (case-insensitive name, date).
//! - No two attendees share an email (case-insensitive).
//! - Every attendee id held by an event exists in the attendee map.
//! - Callers only ever receive owned snapshots.
//!
//! # Persistence failures
//! A failed save after a mutation leaves the mutation applied, except for
//! `delete_event`, which restores the removed event. The error reports which.

use chrono::NaiveDate;
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::clock::{Clock, SystemClock};
use crate::model::attendee::Attendee;
use crate::model::event::{Event, EventDetails};
use crate::model::validation::{email_key, ValidationError};
use crate::model::{AttendeeId, EventId};
use crate::repo::persistence::{Dataset, PersistError, PersistenceGateway};

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Duplicate,
    NotFound,
    Persistence,
}

/// Entity touched by a mutation whose save failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Event(EventId),
    Attendee(AttendeeId),
}

/// In-memory effect of an operation whose save failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOutcome {
    /// The mutation stays in memory; disk may lag behind.
    Applied,
    /// The mutation was undone in memory.
    RolledBack,
    /// No mutation was involved (load, explicit save, diagnostics).
    Unchanged,
}

/// Failure of an entity store operation.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    DuplicateEvent { name: String, date: NaiveDate },
    DuplicateEmail(String),
    AlreadyRegistered {
        event_id: EventId,
        attendee_id: AttendeeId,
    },
    EventNotFound(EventId),
    AttendeeNotFound(AttendeeId),
    NotRegistered {
        event_id: EventId,
        attendee_id: AttendeeId,
    },
    Persistence {
        source: PersistError,
        outcome: MemoryOutcome,
        subject: Option<EntityRef>,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DuplicateEvent { .. } | Self::DuplicateEmail(_) | Self::AlreadyRegistered { .. } => {
                ErrorKind::Duplicate
            }
            Self::EventNotFound(_) | Self::AttendeeNotFound(_) | Self::NotRegistered { .. } => {
                ErrorKind::NotFound
            }
            Self::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    fn persistence(source: PersistError, outcome: MemoryOutcome, subject: Option<EntityRef>) -> Self {
        Self::Persistence {
            source,
            outcome,
            subject,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateEvent { name, date } => {
                write!(f, "an event named `{name}` already exists on {date}")
            }
            Self::DuplicateEmail(email) => write!(f, "an attendee with email `{email}` already exists"),
            Self::AlreadyRegistered {
                event_id,
                attendee_id,
            } => write!(f, "attendee {attendee_id} is already registered to event {event_id}"),
            Self::EventNotFound(id) => write!(f, "event not found: {id}"),
            Self::AttendeeNotFound(id) => write!(f, "attendee not found: {id}"),
            Self::NotRegistered {
                event_id,
                attendee_id,
            } => write!(f, "attendee {attendee_id} is not registered to event {event_id}"),
            Self::Persistence {
                source, outcome, ..
            } => match outcome {
                MemoryOutcome::Applied => write!(f, "change kept in memory but not saved: {source}"),
                MemoryOutcome::RolledBack => write!(f, "change rolled back, save failed: {source}"),
                MemoryOutcome::Unchanged => write!(f, "{source}"),
            },
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Event and attendee store backed by a [`PersistenceGateway`].
pub struct EntityStore<G: PersistenceGateway> {
    gateway: G,
    clock: Box<dyn Clock>,
    events: BTreeMap<EventId, Event>,
    attendees: BTreeMap<AttendeeId, Attendee>,
    next_event_id: EventId,
    next_attendee_id: AttendeeId,
}

impl<G: PersistenceGateway> EntityStore<G> {
    /// Opens the store using the host's calendar date.
    pub fn open(gateway: G) -> StoreResult<Self> {
        Self::open_with_clock(gateway, SystemClock)
    }

    /// Creates missing storage, loads it and indexes the dataset.
    ///
    /// # Errors
    /// - Returns `Persistence` when existing storage cannot be read. Starting
    ///   empty instead would overwrite it on the next save.
    pub fn open_with_clock(gateway: G, clock: impl Clock + 'static) -> StoreResult<Self> {
        gateway.ensure_storage_exists();
        let dataset = gateway
            .load_all()
            .map_err(|err| StoreError::persistence(err, MemoryOutcome::Unchanged, None))?;

        let mut store = Self {
            gateway,
            clock: Box::new(clock),
            events: BTreeMap::new(),
            attendees: BTreeMap::new(),
            next_event_id: 1,
            next_attendee_id: 1,
        };
        store.index_dataset(dataset);
        info!(
            "event=store_open module=store status=ok events={} attendees={} next_event_id={} next_attendee_id={}",
            store.events.len(),
            store.attendees.len(),
            store.next_event_id,
            store.next_attendee_id
        );
        Ok(store)
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Schedules a new event on `date` (today or later).
    pub fn create_event(
        &mut self,
        name: &str,
        date: NaiveDate,
        location: &str,
        description: &str,
    ) -> StoreResult<Event> {
        let details = EventDetails::new(name, date, location, description)?;
        let today = self.today();
        if date < today {
            return Err(ValidationError::DateInPast { date, today }.into());
        }
        self.ensure_slot_free(details.name(), date, None)?;

        let event = Event::new(self.next_event_id, details)?;
        let id = allocate(&mut self.next_event_id, "event")?;
        self.events.insert(id, event.clone());
        info!("event=event_create module=store status=ok event_id={id}");

        self.save(MemoryOutcome::Applied, EntityRef::Event(id))?;
        Ok(event)
    }

    /// Replaces the editable fields of an event that has not taken place yet.
    ///
    /// The new date itself may be in the past; only the current one is checked.
    pub fn modify_event(
        &mut self,
        id: EventId,
        name: &str,
        date: NaiveDate,
        location: &str,
        description: &str,
    ) -> StoreResult<Event> {
        let today = self.today();
        let current_date = self
            .events
            .get(&id)
            .ok_or(StoreError::EventNotFound(id))?
            .date();
        if current_date < today {
            return Err(ValidationError::EventAlreadyPast {
                id,
                date: current_date,
            }
            .into());
        }

        let details = EventDetails::new(name, date, location, description)?;
        self.ensure_slot_free(details.name(), date, Some(id))?;

        let event = self
            .events
            .get_mut(&id)
            .ok_or(StoreError::EventNotFound(id))?;
        event.apply_details(details);
        let snapshot = event.clone();
        info!("event=event_modify module=store status=ok event_id={id}");

        self.save(MemoryOutcome::Applied, EntityRef::Event(id))?;
        Ok(snapshot)
    }

    /// Removes an event; its attendees stay in the store.
    ///
    /// When the save fails the event is put back and the error says so.
    pub fn delete_event(&mut self, id: EventId) -> StoreResult<()> {
        let removed = self
            .events
            .remove(&id)
            .ok_or(StoreError::EventNotFound(id))?;

        if let Err(err) = self.save(MemoryOutcome::RolledBack, EntityRef::Event(id)) {
            self.events.insert(id, removed);
            warn!("event=event_delete module=store status=rolled_back event_id={id}");
            return Err(err);
        }
        info!("event=event_delete module=store status=ok event_id={id}");
        Ok(())
    }

    /// Registers a new attendee. Emails are unique regardless of case.
    pub fn create_attendee(
        &mut self,
        name: &str,
        email: &str,
        phone: &str,
    ) -> StoreResult<Attendee> {
        let key = email_key(email);
        if self.attendees.values().any(|a| a.email() == key) {
            return Err(StoreError::DuplicateEmail(key));
        }

        // Built with the pending id; the counter only advances once it is valid.
        let attendee = Attendee::new(self.next_attendee_id, name, email, phone)?;
        let id = allocate(&mut self.next_attendee_id, "attendee")?;
        self.attendees.insert(id, attendee.clone());
        info!("event=attendee_create module=store status=ok attendee_id={id}");

        self.save(MemoryOutcome::Applied, EntityRef::Attendee(id))?;
        Ok(attendee)
    }

    pub fn add_attendee_to_event(
        &mut self,
        event_id: EventId,
        attendee_id: AttendeeId,
    ) -> StoreResult<()> {
        if !self.events.contains_key(&event_id) {
            return Err(StoreError::EventNotFound(event_id));
        }
        if !self.attendees.contains_key(&attendee_id) {
            return Err(StoreError::AttendeeNotFound(attendee_id));
        }
        let event = self
            .events
            .get_mut(&event_id)
            .ok_or(StoreError::EventNotFound(event_id))?;
        if !event.add_attendee(attendee_id) {
            return Err(StoreError::AlreadyRegistered {
                event_id,
                attendee_id,
            });
        }
        info!(
            "event=registration_add module=store status=ok event_id={event_id} attendee_id={attendee_id}"
        );

        self.save(MemoryOutcome::Applied, EntityRef::Event(event_id))
    }

    pub fn remove_attendee_from_event(
        &mut self,
        event_id: EventId,
        attendee_id: AttendeeId,
    ) -> StoreResult<()> {
        let event = self
            .events
            .get_mut(&event_id)
            .ok_or(StoreError::EventNotFound(event_id))?;
        if !event.remove_attendee(attendee_id) {
            return Err(StoreError::NotRegistered {
                event_id,
                attendee_id,
            });
        }
        info!(
            "event=registration_remove module=store status=ok event_id={event_id} attendee_id={attendee_id}"
        );

        self.save(MemoryOutcome::Applied, EntityRef::Event(event_id))
    }

    pub fn by_id(&self, id: EventId) -> Option<Event> {
        self.events.get(&id).cloned()
    }

    pub fn attendee_by_id(&self, id: AttendeeId) -> Option<Attendee> {
        self.attendees.get(&id).cloned()
    }

    /// Events dated today or later, earliest first.
    pub fn list_future(&self) -> Vec<Event> {
        let today = self.today();
        let mut events = self.collect_events(|e| e.is_future(today));
        events.sort_by_key(|e| (e.date(), e.id()));
        events
    }

    /// Events dated before today, most recent first.
    pub fn list_past(&self) -> Vec<Event> {
        let today = self.today();
        let mut events = self.collect_events(|e| e.is_past(today));
        events.sort_by(|a, b| b.date().cmp(&a.date()).then(a.id().cmp(&b.id())));
        events
    }

    /// Every event, earliest first.
    pub fn list_all(&self) -> Vec<Event> {
        let mut events = self.collect_events(|_| true);
        events.sort_by_key(|e| (e.date(), e.id()));
        events
    }

    /// Attendees of `event_id` in registration order; empty when unknown.
    pub fn list_attendees(&self, event_id: EventId) -> Vec<Attendee> {
        self.events
            .get(&event_id)
            .map(|event| {
                event
                    .attendee_ids()
                    .iter()
                    .filter_map(|id| self.attendees.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every attendee ordered by id.
    pub fn list_all_attendees(&self) -> Vec<Attendee> {
        self.attendees.values().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn attendee_count(&self) -> usize {
        self.attendees.len()
    }

    /// Saves the current state; called on graceful shutdown.
    pub fn persist_now(&self) -> StoreResult<()> {
        self.write_all()
            .map_err(|err| StoreError::persistence(err, MemoryOutcome::Unchanged, None))
    }

    /// Pre-flight diagnostic of the backing storage.
    pub fn check_accessible(&self) -> StoreResult<()> {
        self.gateway
            .check_accessible()
            .map_err(|err| StoreError::persistence(err, MemoryOutcome::Unchanged, None))
    }

    fn ensure_slot_free(
        &self,
        name: &str,
        date: NaiveDate,
        except: Option<EventId>,
    ) -> StoreResult<()> {
        let taken = self
            .events
            .values()
            .any(|e| Some(e.id()) != except && e.occupies_slot(name, date));
        if taken {
            return Err(StoreError::DuplicateEvent {
                name: name.to_string(),
                date,
            });
        }
        Ok(())
    }

    fn collect_events(&self, keep: impl Fn(&Event) -> bool) -> Vec<Event> {
        self.events.values().filter(|e| keep(e)).cloned().collect()
    }

    fn write_all(&self) -> Result<(), PersistError> {
        let events: Vec<&Event> = self.events.values().collect();
        let attendees: Vec<&Attendee> = self.attendees.values().collect();
        self.gateway.save_all(&events, &attendees)
    }

    fn save(&self, outcome: MemoryOutcome, subject: EntityRef) -> StoreResult<()> {
        self.write_all().map_err(|err| {
            warn!(
                "event=store_save module=store status=error subject={subject:?} error={err}"
            );
            StoreError::persistence(err, outcome, Some(subject))
        })
    }

    /// Indexes loaded records, dropping any that would break an invariant.
    /// The first occurrence always wins.
    fn index_dataset(&mut self, dataset: Dataset) {
        let mut emails = HashSet::new();
        for attendee in dataset.attendees {
            let id = attendee.id();
            if self.attendees.contains_key(&id) {
                warn!("event=store_open module=store status=skip attendee_id={id} reason=repeated_id");
                continue;
            }
            if !emails.insert(attendee.email().to_string()) {
                warn!(
                    "event=store_open module=store status=skip attendee_id={id} reason=repeated_email"
                );
                continue;
            }
            self.attendees.insert(id, attendee);
        }

        for mut event in dataset.events {
            let id = event.id();
            if self.events.contains_key(&id) {
                warn!("event=store_open module=store status=skip event_id={id} reason=repeated_id");
                continue;
            }
            if self
                .events
                .values()
                .any(|e| e.occupies_slot(event.name(), event.date()))
            {
                warn!(
                    "event=store_open module=store status=skip event_id={id} reason=repeated_name_and_date"
                );
                continue;
            }
            let attendees = &self.attendees;
            event.retain_attendees(|attendee_id| attendees.contains_key(&attendee_id));
            self.events.insert(id, event);
        }

        self.next_event_id = next_id_after(self.events.keys().next_back().copied());
        self.next_attendee_id = next_id_after(self.attendees.keys().next_back().copied());
    }
}

fn next_id_after(max: Option<u32>) -> u32 {
    max.map_or(1, |id| id.saturating_add(1))
}

/// Hands out the counter value and advances it; never reuses an id.
fn allocate(counter: &mut u32, kind: &'static str) -> Result<u32, ValidationError> {
    let id = *counter;
    *counter = id
        .checked_add(1)
        .ok_or(ValidationError::IdSpaceExhausted(kind))?;
    Ok(id)
}
