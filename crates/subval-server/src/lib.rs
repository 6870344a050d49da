//! Scheduling, release bookkeeping and notifications around the validation
//! engine, plus the pieces the `subval` binary is built from.

pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod release;
pub mod scheduler;

pub use config::{MailConfig, ServerConfig, StorageConfig, ValidatorConfig};
pub use error::{ConfigError, LoggingError, Result, SchedulerError};
pub use mail::{LogMailService, MailService};
pub use release::{Admission, MemoryReleaseService, ReleaseService, StorageLayout};
pub use scheduler::{
    Cancellation, PipelineValidator, SchedulerConfig, SubmissionValidator, Tick,
    ValidationScheduler,
};
