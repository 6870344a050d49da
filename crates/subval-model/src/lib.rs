//! Data model shared by the submission validation crates.

pub mod error;
pub mod error_type;
pub mod file_type;
pub mod release;
pub mod report;
pub mod state;

pub use error::{ModelError, Result};
pub use error_type::ErrorType;
pub use file_type::{DataType, FileType};
pub use release::{QueuedProject, Release, ReleaseState, Submission, SubmissionFile};
pub use report::{
    DataTypeReport, ErrorReport, FILE_LEVEL_LINE, FieldErrorReport, FieldReport, FileReport,
    FileTypeReport, MAX_ERROR_SAMPLES, Report, ReportError,
};
pub use state::{DataTypeState, FileState, FileTypeState, Outcome, ReportState, SubmissionState};
