//! Runtime configuration for storage and logging.
//!
//! # Responsibility
//! - Describe where the two data files live and how they are written.
//! - Resolve settings from `EVENTKEEPER_*` environment variables.
//!
//! # Invariants
//! - `StorageConfig::data_dir` is absolute after `from_env`.
//! - Unknown values fall back to defaults instead of failing startup.

use std::env;
use std::path::{Path, PathBuf};

use crate::logging::default_log_level;

/// Default file name for event records.
pub const DEFAULT_EVENTS_FILE: &str = "events.csv";
/// Default file name for attendee records.
pub const DEFAULT_ATTENDEES_FILE: &str = "attendees.csv";

pub const ENV_DATA_DIR: &str = "EVENTKEEPER_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "EVENTKEEPER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "EVENTKEEPER_LOG_DIR";
pub const ENV_SAVE_MODE: &str = "EVENTKEEPER_SAVE_MODE";

/// How a single data file is rewritten on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Write `<file>.tmp`, sync, then rename over the target.
    #[default]
    AtomicRename,
    /// Truncate and rewrite the target in place.
    Direct,
}

impl SaveMode {
    /// Parses `atomic` or `direct` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "atomic" | "atomic_rename" => Some(Self::AtomicRename),
            "direct" => Some(Self::Direct),
            _ => None,
        }
    }
}

/// Location and write policy of the events/attendees files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub events_file: String,
    pub attendees_file: String,
    pub save_mode: SaveMode,
}

impl StorageConfig {
    /// Default file names inside `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            events_file: DEFAULT_EVENTS_FILE.to_string(),
            attendees_file: DEFAULT_ATTENDEES_FILE.to_string(),
            save_mode: SaveMode::default(),
        }
    }

    pub fn with_save_mode(mut self, save_mode: SaveMode) -> Self {
        self.save_mode = save_mode;
        self
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join(&self.events_file)
    }

    pub fn attendees_path(&self) -> PathBuf {
        self.data_dir.join(&self.attendees_file)
    }
}

/// Logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    /// `None` leaves file logging disabled.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(&current_dir, |key| env::var(key).ok())
    }

    /// Resolves settings through `lookup`; relative paths are joined onto
    /// `base_dir`.
    pub fn from_lookup(base_dir: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = non_empty(ENV_DATA_DIR)
            .map(|value| resolve_dir(base_dir, value.trim()))
            .unwrap_or_else(|| base_dir.to_path_buf());
        let save_mode = non_empty(ENV_SAVE_MODE)
            .and_then(|value| SaveMode::parse(&value))
            .unwrap_or_default();
        let level = non_empty(ENV_LOG_LEVEL)
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| default_log_level().to_string());
        let log_dir = non_empty(ENV_LOG_DIR).map(|value| resolve_dir(base_dir, value.trim()));

        Self {
            storage: StorageConfig::new(data_dir).with_save_mode(save_mode),
            logging: LoggingConfig { level, log_dir },
        }
    }
}

fn resolve_dir(base_dir: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
