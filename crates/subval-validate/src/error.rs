use std::path::PathBuf;

use subval_ingest::IngestError;
use subval_model::FileType;
use thiserror::Error;

use crate::cancel::StopReason;

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write normalized rows to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("validation stopped: {0}")]
    Stopped(StopReason),

    #[error("digest worker for {file_type} panicked")]
    WorkerPanicked { file_type: FileType },
}

pub type Result<T> = std::result::Result<T, ValidateError>;
