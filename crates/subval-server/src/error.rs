//! Error types for configuration, logging, release bookkeeping and scheduling.

use std::path::PathBuf;

use subval_core::StateError;
use subval_ingest::IngestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    // === Release bookkeeping ===
    /// The scheduler only runs against exactly one open release.
    #[error("expected exactly one open release, found {0}")]
    OpenReleaseCount(usize),

    #[error("no open release")]
    NoOpenRelease,

    #[error("release {0} already exists")]
    DuplicateRelease(String),

    #[error("unknown project {0}")]
    UnknownProject(String),

    #[error("project {0} is already queued")]
    AlreadyQueued(String),

    #[error("project {0} is not queued")]
    NotQueued(String),

    #[error("release {0} has no signed off submission")]
    NothingSignedOff(String),

    #[error("release {release} still has validations running: {}", projects.join(", "))]
    ValidationInProgress {
        release: String,
        projects: Vec<String>,
    },

    // === Wrapped ===
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
