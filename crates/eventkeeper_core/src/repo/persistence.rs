//! Persistence gateway contract and two-file implementation.
//!
//! # Responsibility
//! - Save and load the complete event/attendee dataset.
//! - Resolve attendee ids embedded in event records.
//!
//! # Invariants
//! - Saves write the attendees file first, then the events file. The pair is
//!   NOT written atomically: a failure between the two leaves them out of
//!   step, and callers must treat any save error as "on-disk state unknown".
//! - Loads never fail because of a single bad record; it is logged and
//!   skipped. Missing files load as an empty dataset.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::codec::{
    attendee_to_record, decode_attendee, decode_event, event_to_record, DecodeError, RawRecord,
    RecordCursor,
};
use crate::config::{SaveMode, StorageConfig};
use crate::model::attendee::Attendee;
use crate::model::event::Event;
use crate::model::AttendeeId;

pub type PersistResult<T> = Result<T, PersistError>;

/// Which accessibility check a data file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheck {
    Missing,
    NotReadable,
    NotWritable,
}

impl Display for AccessCheck {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::NotReadable => write!(f, "not readable"),
            Self::NotWritable => write!(f, "not writable"),
        }
    }
}

/// One failed accessibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFailure {
    pub path: PathBuf,
    pub check: AccessCheck,
}

/// Storage-level failure.
#[derive(Debug)]
pub enum PersistError {
    /// Reading or writing `path` failed.
    Io { path: PathBuf, source: io::Error },
    /// Pre-flight check found unusable data files.
    Inaccessible(Vec<AccessFailure>),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error on `{}`: {source}", path.display()),
            Self::Inaccessible(failures) => {
                write!(f, "data files not accessible:")?;
                for failure in failures {
                    write!(f, " `{}` {};", failure.path.display(), failure.check)?;
                }
                Ok(())
            }
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Inaccessible(_) => None,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Everything a load produced.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub events: Vec<Event>,
    pub attendees: Vec<Attendee>,
}

/// Durable storage for the whole dataset.
pub trait PersistenceGateway {
    /// Writes both entity sets. Not atomic across the two sets.
    fn save_all(&self, events: &[&Event], attendees: &[&Attendee]) -> PersistResult<()>;
    /// Reads both entity sets with attendee references resolved.
    fn load_all(&self) -> PersistResult<Dataset>;
    /// Best-effort creation of empty storage; failures are only logged.
    fn ensure_storage_exists(&self);
    /// Verifies storage is present, readable and writable.
    fn check_accessible(&self) -> PersistResult<()>;
}

/// Stores attendees and events in two delimited text files.
#[derive(Debug, Clone)]
pub struct FilePersistenceGateway {
    events_path: PathBuf,
    attendees_path: PathBuf,
    save_mode: SaveMode,
}

impl FilePersistenceGateway {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            events_path: config.events_path(),
            attendees_path: config.attendees_path(),
            save_mode: config.save_mode,
        }
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn attendees_path(&self) -> &Path {
        &self.attendees_path
    }

    fn data_files(&self) -> [&Path; 2] {
        [&self.events_path, &self.attendees_path]
    }

    fn write_file(&self, path: &Path, content: &str) -> PersistResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        match self.save_mode {
            SaveMode::Direct => fs::write(path, content).map_err(io_error(path)),
            SaveMode::AtomicRename => {
                let temp_path = temp_path_for(path);
                let write_temp = || -> io::Result<()> {
                    let mut file = File::create(&temp_path)?;
                    file.write_all(content.as_bytes())?;
                    file.sync_all()
                };
                if let Err(err) = write_temp() {
                    let _ = fs::remove_file(&temp_path);
                    return Err(PersistError::Io {
                        path: temp_path,
                        source: err,
                    });
                }
                fs::rename(&temp_path, path).map_err(io_error(path))
            }
        }
    }

    /// `None` when the file does not exist.
    fn read_file(&self, path: &Path) -> PersistResult<Option<String>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(
                    "event=storage_load module=repo status=skip path={} reason=missing_file",
                    path.display()
                );
                return Ok(None);
            }
            Err(err) => return Err(io_error(path)(err)),
        };
        match String::from_utf8(bytes) {
            Ok(content) => Ok(Some(content)),
            Err(err) => {
                warn!(
                    "event=storage_load module=repo status=warn path={} reason=invalid_utf8",
                    path.display()
                );
                Ok(Some(String::from_utf8_lossy(err.as_bytes()).into_owned()))
            }
        }
    }

    fn load_attendees(&self) -> PersistResult<Vec<Attendee>> {
        let Some(content) = self.read_file(&self.attendees_path)? else {
            return Ok(Vec::new());
        };
        Ok(decode_records(&content, &self.attendees_path, decode_attendee))
    }

    fn load_events(&self, known_attendees: &HashSet<AttendeeId>) -> PersistResult<Vec<Event>> {
        let Some(content) = self.read_file(&self.events_path)? else {
            return Ok(Vec::new());
        };

        let records = decode_records(&content, &self.events_path, decode_event);
        let mut events = Vec::with_capacity(records.len());
        for record in records {
            let mut event = record.event;
            for attendee_id in record.attendee_ids {
                if known_attendees.contains(&attendee_id) {
                    event.add_attendee(attendee_id);
                } else {
                    warn!(
                        "event=storage_load module=repo status=skip event_id={} attendee_id={} reason=dangling_attendee",
                        event.id(),
                        attendee_id
                    );
                }
            }
            events.push(event);
        }
        Ok(events)
    }
}

impl PersistenceGateway for FilePersistenceGateway {
    fn save_all(&self, events: &[&Event], attendees: &[&Attendee]) -> PersistResult<()> {
        let started_at = Instant::now();

        let attendee_content = render(attendees.iter().map(|a| attendee_to_record(a)));
        self.write_file(&self.attendees_path, &attendee_content)?;
        let event_content = render(events.iter().map(|e| event_to_record(e)));
        self.write_file(&self.events_path, &event_content)?;

        debug!(
            "event=storage_save module=repo status=ok events={} attendees={} duration_ms={}",
            events.len(),
            attendees.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn load_all(&self) -> PersistResult<Dataset> {
        let started_at = Instant::now();

        let attendees = self.load_attendees()?;
        let known: HashSet<AttendeeId> = attendees.iter().map(Attendee::id).collect();
        let events = self.load_events(&known)?;

        info!(
            "event=storage_load module=repo status=ok events={} attendees={} duration_ms={}",
            events.len(),
            attendees.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Dataset { events, attendees })
    }

    fn ensure_storage_exists(&self) {
        for path in self.data_files() {
            if path.exists() {
                continue;
            }
            let created = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| {
                    OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(path)
                        .map(drop)
                });
            match created {
                Ok(()) => info!(
                    "event=storage_init module=repo status=ok path={}",
                    path.display()
                ),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => warn!(
                    "event=storage_init module=repo status=error path={} error={}",
                    path.display(),
                    err
                ),
            }
        }
    }

    fn check_accessible(&self) -> PersistResult<()> {
        let mut failures = Vec::new();
        for path in self.data_files() {
            if !path.is_file() {
                failures.push(AccessFailure {
                    path: path.to_path_buf(),
                    check: AccessCheck::Missing,
                });
                continue;
            }
            if File::open(path).is_err() {
                failures.push(AccessFailure {
                    path: path.to_path_buf(),
                    check: AccessCheck::NotReadable,
                });
            }
            if OpenOptions::new().append(true).open(path).is_err() {
                failures.push(AccessFailure {
                    path: path.to_path_buf(),
                    check: AccessCheck::NotWritable,
                });
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        warn!(
            "event=storage_check module=repo status=error failures={}",
            failures.len()
        );
        Err(PersistError::Inaccessible(failures))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn render(records: impl Iterator<Item = String>) -> String {
    let mut content = String::new();
    for record in records {
        content.push_str(&record);
        content.push('\n');
    }
    content
}

/// Decodes every logical record of `content`, skipping the ones that fail.
///
/// A failed multi-line record only costs its first physical line; the
/// lines after it are scanned again as fresh records.
fn decode_records<T>(
    content: &str,
    path: &Path,
    decode: impl Fn(&str) -> Result<T, DecodeError>,
) -> Vec<T> {
    let mut decoded = Vec::new();
    let mut cursor = RecordCursor::new(content);
    while let Some(record) = cursor.next() {
        match decode(&record.text) {
            Ok(value) => decoded.push(value),
            Err(err) => {
                log_skipped(path, &record, &err);
                if record.line_count > 1 {
                    cursor.resume_after_first_line(&record);
                }
            }
        }
    }
    decoded
}

fn log_skipped(path: &Path, record: &RawRecord, err: &DecodeError) {
    warn!(
        "event=record_decode module=repo status=skip path={} line={} error={}",
        path.display(),
        record.line_no,
        err
    );
}
