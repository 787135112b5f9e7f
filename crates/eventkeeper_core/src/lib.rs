//! Core of eventkeeper: events, attendees and their two-file storage.
//! This crate is the single source of truth for business invariants.

pub mod clock;
pub mod codec;
pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, SystemClock};
pub use config::{AppConfig, LoggingConfig, SaveMode, StorageConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::attendee::Attendee;
pub use model::event::{Event, EventDetails};
pub use model::validation::ValidationError;
pub use model::{AttendeeId, EventId};
pub use repo::persistence::{
    AccessCheck, AccessFailure, Dataset, FilePersistenceGateway, PersistError, PersistResult,
    PersistenceGateway,
};
pub use service::entity_store::{
    EntityRef, EntityStore, ErrorKind, MemoryOutcome, StoreError, StoreResult,
};

/// Store over the default two-file storage.
pub type FileEntityStore = EntityStore<FilePersistenceGateway>;

/// Opens the file-backed store described by `config`.
pub fn open_file_store(config: &StorageConfig) -> StoreResult<FileEntityStore> {
    EntityStore::open(FilePersistenceGateway::new(config))
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
