//! File-presence and header checks run before any row is read.

use std::collections::{BTreeMap, BTreeSet};

use subval_ingest::{group_by_file_type, read_header};
use subval_model::{DataType, ErrorType, FILE_LEVEL_LINE, FileType, ReportError, SubmissionFile};
use thiserror::Error;
use tracing::{debug, warn};

use crate::kv::{is_required, key_spec};

/// Line number of the header row.
const HEADER_LINE: u64 = 1;

/// Files to validate: exactly one per file type of the requested data types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPlan {
    pub data_types: Vec<DataType>,
    pub files: BTreeMap<FileType, SubmissionFile>,
}

/// Required files are missing, duplicated or unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("submission is structurally invalid ({} errors)", errors.len())]
pub struct StructuralValidationFailure {
    pub errors: Vec<ReportError>,
}

/// Requested data types plus clinical whenever a feature type is requested,
/// sorted and de-duplicated.
pub fn effective_data_types(requested: &[DataType]) -> Vec<DataType> {
    let mut data_types: BTreeSet<DataType> = requested.iter().copied().collect();
    if data_types.iter().any(|data_type| data_type.is_feature()) {
        data_types.insert(DataType::Clinical);
    }
    data_types.into_iter().collect()
}

/// Checks the file listing of a submission for `data_types`.
pub fn plan_validation(
    files: &[SubmissionFile],
    data_types: &[DataType],
) -> Result<ValidationPlan, StructuralValidationFailure> {
    let grouped = group_by_file_type(files);
    let mut errors = Vec::new();
    let mut planned = BTreeMap::new();

    for &data_type in data_types {
        for &file_type in data_type.file_types() {
            match grouped.get(&file_type).map(Vec::as_slice) {
                None | Some([]) => {
                    if is_required(file_type) {
                        errors.push(
                            ReportError::new(
                                format!("{file_type}.txt"),
                                file_type,
                                ErrorType::MissingFile,
                                FILE_LEVEL_LINE,
                            )
                            .with_value(file_type.as_str()),
                        );
                    }
                }
                Some([file]) => {
                    if let Some(error) = check_header(file_type, file) {
                        errors.push(error);
                    } else {
                        planned.insert(file_type, file.clone());
                    }
                }
                Some(duplicates) => {
                    for file in duplicates {
                        errors.push(
                            ReportError::new(
                                file.name.as_str(),
                                file_type,
                                ErrorType::TooManyFiles,
                                FILE_LEVEL_LINE,
                            )
                            .with_value(file.name.as_str())
                            .with_parameter("count", duplicates.len().to_string()),
                        );
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        debug!(files = planned.len(), "validation planned");
        Ok(ValidationPlan {
            data_types: data_types.to_vec(),
            files: planned,
        })
    } else {
        warn!(errors = errors.len(), "submission is structurally invalid");
        Err(StructuralValidationFailure { errors })
    }
}

/// The header must be wide enough to hold every declared key column.
fn check_header(file_type: FileType, file: &SubmissionFile) -> Option<ReportError> {
    let error = |value: String| {
        ReportError::new(file.name.as_str(), file_type, ErrorType::FileHeader, HEADER_LINE)
            .with_value(value)
    };
    let header = match read_header(&file.path) {
        Ok(header) => header,
        Err(err) => return Some(error(err.to_string())),
    };
    let spec = key_spec(file_type);
    let missing: Vec<&str> = spec
        .key_columns()
        .into_iter()
        .filter(|(index, _)| *index >= header.len())
        .map(|(_, name)| name)
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(
            error(header.len().to_string())
                .with_fields(missing)
                .with_parameter("expectedColumns", (spec.max_index() + 1).to_string()),
        )
    }
}
