//! Reading and discovering tab-separated submission files.

pub mod discovery;
pub mod error;
pub mod reader;

pub use discovery::{discover_submission_files, group_by_file_type, list_submission_files};
pub use error::{IngestError, Result};
pub use reader::{DEFAULT_LOG_THRESHOLD, Row, TsvReader, read_header};
