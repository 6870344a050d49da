//! Validation report tree.
//!
//! `Report → DataTypeReport → FileTypeReport → FileReport`. The variant set is
//! closed, so every operation below is a direct walk over the owned tree.
//! Children are kept sorted (data type, file type, file name) so that the
//! serialized form is stable.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error_type::ErrorType;
use crate::file_type::{DataType, FileType};
use crate::release::SubmissionFile;
use crate::state::{DataTypeState, FileState, FileTypeState, ReportState};

/// Maximum number of `(line, value)` samples kept per field error.
pub const MAX_ERROR_SAMPLES: usize = 50;

/// Line number used for errors that concern a whole file.
pub const FILE_LEVEL_LINE: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub data_type_reports: Vec<DataTypeReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTypeReport {
    pub data_type: DataType,
    pub state: DataTypeState,
    pub file_type_reports: Vec<FileTypeReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTypeReport {
    pub file_type: FileType,
    pub state: FileTypeState,
    pub file_reports: Vec<FileReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file_name: String,
    pub file_type: FileType,
    pub state: FileState,
    pub field_reports: Vec<FieldReport>,
    pub error_reports: Vec<ErrorReport>,
}

/// Population counts for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReport {
    pub name: String,
    pub populated: u64,
    pub missing: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_type: ErrorType,
    pub field_error_reports: Vec<FieldErrorReport>,
}

/// Occurrences of one error type on one set of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrorReport {
    pub field_names: Vec<String>,
    pub parameters: BTreeMap<String, String>,
    /// Total occurrences, including those beyond the sample limit.
    pub count: u64,
    pub line_numbers: Vec<u64>,
    pub values: Vec<String>,
}

/// A single error occurrence to be folded into a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportError {
    pub file_name: String,
    pub file_type: FileType,
    pub error_type: ErrorType,
    pub line_number: u64,
    pub field_names: Vec<String>,
    pub value: String,
    pub parameters: BTreeMap<String, String>,
}

impl ReportError {
    pub fn new(
        file_name: impl Into<String>,
        file_type: FileType,
        error_type: ErrorType,
        line_number: u64,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_type,
            error_type,
            line_number,
            field_names: Vec::new(),
            value: String::new(),
            parameters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

impl FileReport {
    fn new(file_name: String, file_type: FileType) -> Self {
        Self {
            file_name,
            file_type,
            state: ReportState::NotValidated,
            field_reports: Vec::new(),
            error_reports: Vec::new(),
        }
    }

    pub fn error_count(&self) -> u64 {
        self.error_reports
            .iter()
            .flat_map(|report| &report.field_error_reports)
            .map(|field| field.count)
            .sum()
    }

    pub fn has_errors(&self) -> bool {
        !self.error_reports.is_empty()
    }

    fn reset(&mut self) {
        self.state = ReportState::NotValidated;
        self.field_reports.clear();
        self.error_reports.clear();
    }

    fn add_error(&mut self, error: ReportError) {
        let position = match self
            .error_reports
            .iter()
            .position(|report| report.error_type == error.error_type)
        {
            Some(position) => position,
            None => {
                self.error_reports.push(ErrorReport {
                    error_type: error.error_type,
                    field_error_reports: Vec::new(),
                });
                self.error_reports.len() - 1
            }
        };
        let fields = &mut self.error_reports[position].field_error_reports;
        let field = match fields.iter_mut().position(|field| {
            field.field_names == error.field_names && field.parameters == error.parameters
        }) {
            Some(index) => &mut fields[index],
            None => {
                fields.push(FieldErrorReport {
                    field_names: error.field_names,
                    parameters: error.parameters,
                    count: 0,
                    line_numbers: Vec::new(),
                    values: Vec::new(),
                });
                let last = fields.len() - 1;
                &mut fields[last]
            }
        };
        field.count += 1;
        if field.line_numbers.len() < MAX_ERROR_SAMPLES {
            field.line_numbers.push(error.line_number);
            field.values.push(error.value);
        }
    }
}

impl FileTypeReport {
    fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            state: ReportState::NotValidated,
            file_reports: Vec::new(),
        }
    }

    fn file_report_entry(&mut self, file_name: &str) -> &mut FileReport {
        let index = match self
            .file_reports
            .binary_search_by(|report| report.file_name.as_str().cmp(file_name))
        {
            Ok(index) => index,
            Err(index) => {
                self.file_reports.insert(
                    index,
                    FileReport::new(file_name.to_string(), self.file_type),
                );
                index
            }
        };
        &mut self.file_reports[index]
    }
}

impl DataTypeReport {
    fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            state: ReportState::NotValidated,
            file_type_reports: Vec::new(),
        }
    }

    fn file_type_entry(&mut self, file_type: FileType) -> &mut FileTypeReport {
        let index = match self
            .file_type_reports
            .binary_search_by_key(&file_type, |report| report.file_type)
        {
            Ok(index) => index,
            Err(index) => {
                self.file_type_reports
                    .insert(index, FileTypeReport::new(file_type));
                index
            }
        };
        &mut self.file_type_reports[index]
    }

    fn set_state(&mut self, state: ReportState) {
        self.state = state;
        for file_type_report in &mut self.file_type_reports {
            file_type_report.state = state;
            for file_report in &mut file_type_report.file_reports {
                file_report.state = state;
            }
        }
    }

    fn reset(&mut self) {
        self.state = ReportState::NotValidated;
        for file_type_report in &mut self.file_type_reports {
            file_type_report.state = ReportState::NotValidated;
            for file_report in &mut file_type_report.file_reports {
                file_report.reset();
            }
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &FileReport> {
        self.file_type_reports
            .iter()
            .flat_map(|report| &report.file_reports)
    }
}

impl Report {
    /// Builds a fresh report with one `NOT_VALIDATED` file report per known file.
    pub fn from_files(files: &[SubmissionFile]) -> Self {
        let mut report = Report::default();
        report.refresh_files(files);
        report
    }

    /// Brings the file reports in line with the current file listing.
    ///
    /// Returns the data types whose file set changed.
    pub fn refresh_files(&mut self, files: &[SubmissionFile]) -> BTreeSet<DataType> {
        let mut changed = BTreeSet::new();
        let listed: BTreeSet<&str> = files
            .iter()
            .filter(|file| file.file_type.is_some())
            .map(|file| file.name.as_str())
            .collect();

        for data_type_report in &mut self.data_type_reports {
            for file_type_report in &mut data_type_report.file_type_reports {
                let before = file_type_report.file_reports.len();
                file_type_report
                    .file_reports
                    .retain(|report| listed.contains(report.file_name.as_str()));
                if file_type_report.file_reports.len() != before {
                    changed.insert(data_type_report.data_type);
                }
            }
            data_type_report
                .file_type_reports
                .retain(|report| !report.file_reports.is_empty());
        }
        self.data_type_reports
            .retain(|report| !report.file_type_reports.is_empty());

        for file in files {
            let Some(file_type) = file.file_type else {
                continue;
            };
            if self.file_report(&file.name).is_none() {
                self.file_report_entry(file_type, &file.name);
                changed.insert(file_type.data_type());
            }
        }
        changed
    }

    fn data_type_entry(&mut self, data_type: DataType) -> &mut DataTypeReport {
        let index = match self
            .data_type_reports
            .binary_search_by_key(&data_type, |report| report.data_type)
        {
            Ok(index) => index,
            Err(index) => {
                self.data_type_reports
                    .insert(index, DataTypeReport::new(data_type));
                index
            }
        };
        &mut self.data_type_reports[index]
    }

    fn file_report_entry(&mut self, file_type: FileType, file_name: &str) -> &mut FileReport {
        self.data_type_entry(file_type.data_type())
            .file_type_entry(file_type)
            .file_report_entry(file_name)
    }

    /// Adds a `NOT_VALIDATED` file report; a file that is already listed is kept as is.
    pub fn add_file(&mut self, file_type: FileType, file_name: &str) {
        self.file_report_entry(file_type, file_name);
    }

    /// Drops a file report and any parent left without files.
    ///
    /// Returns the data type the file belonged to, if it was listed.
    pub fn remove_file(&mut self, file_name: &str) -> Option<DataType> {
        let mut removed = None;
        for data_type_report in &mut self.data_type_reports {
            for file_type_report in &mut data_type_report.file_type_reports {
                let before = file_type_report.file_reports.len();
                file_type_report
                    .file_reports
                    .retain(|report| report.file_name != file_name);
                if file_type_report.file_reports.len() != before {
                    removed = Some(data_type_report.data_type);
                }
            }
            data_type_report
                .file_type_reports
                .retain(|report| !report.file_reports.is_empty());
        }
        self.data_type_reports
            .retain(|report| !report.file_type_reports.is_empty());
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.data_type_reports.is_empty()
    }

    pub fn data_type_report(&self, data_type: DataType) -> Option<&DataTypeReport> {
        self.data_type_reports
            .iter()
            .find(|report| report.data_type == data_type)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileReport> {
        self.data_type_reports
            .iter()
            .flat_map(DataTypeReport::files)
    }

    fn files_mut(&mut self) -> impl Iterator<Item = &mut FileReport> {
        self.data_type_reports
            .iter_mut()
            .flat_map(|report| &mut report.file_type_reports)
            .flat_map(|report| &mut report.file_reports)
    }

    pub fn file_report(&self, file_name: &str) -> Option<&FileReport> {
        self.files().find(|report| report.file_name == file_name)
    }

    /// Records one error, creating the file report if it does not exist yet.
    pub fn add_error(&mut self, error: ReportError) {
        let file_name = error.file_name.clone();
        self.file_report_entry(error.file_type, &file_name)
            .add_error(error);
    }

    pub fn set_field_reports(&mut self, file_name: &str, field_reports: Vec<FieldReport>) {
        if let Some(report) = self
            .files_mut()
            .find(|report| report.file_name == file_name)
        {
            report.field_reports = field_reports;
        }
    }

    pub fn error_count(&self) -> u64 {
        self.files().map(FileReport::error_count).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.files().any(FileReport::has_errors)
    }

    /// True when there is at least one data type and all of them are valid.
    pub fn is_valid(&self) -> bool {
        !self.data_type_reports.is_empty()
            && self
                .data_type_reports
                .iter()
                .all(|report| report.state == ReportState::Valid)
    }

    pub fn data_type_states(&self) -> BTreeMap<DataType, DataTypeState> {
        self.data_type_reports
            .iter()
            .map(|report| (report.data_type, report.state))
            .collect()
    }

    pub fn reset_data_types(&mut self, data_types: &[DataType]) {
        for report in &mut self.data_type_reports {
            if data_types.contains(&report.data_type) {
                report.reset();
            }
        }
    }

    pub fn notify_queued(&mut self, data_types: &[DataType]) {
        self.notify(data_types, ReportState::Queued);
    }

    pub fn notify_validating(&mut self, data_types: &[DataType]) {
        self.notify(data_types, ReportState::Validating);
    }

    pub fn notify_error(&mut self, data_types: &[DataType]) {
        self.notify(data_types, ReportState::Error);
    }

    fn notify(&mut self, data_types: &[DataType], state: ReportState) {
        for report in &mut self.data_type_reports {
            if data_types.contains(&report.data_type) {
                report.set_state(state);
            }
        }
    }

    /// Settles file states from their errors and re-aggregates parents.
    ///
    /// A file with errors becomes `INVALID`; a file still `VALIDATING` without
    /// errors becomes `VALID`. Other file states are left alone.
    pub fn refresh_state(&mut self) {
        for file in self.files_mut() {
            if file.has_errors() {
                file.state = ReportState::Invalid;
            } else if file.state == ReportState::Validating {
                file.state = ReportState::Valid;
            }
        }
        for data_type_report in &mut self.data_type_reports {
            for file_type_report in &mut data_type_report.file_type_reports {
                file_type_report.state = ReportState::aggregate(
                    file_type_report.file_reports.iter().map(|file| file.state),
                );
            }
            data_type_report.state = ReportState::aggregate(
                data_type_report
                    .file_type_reports
                    .iter()
                    .map(|report| report.state),
            );
        }
    }

    /// Replaces the listed data types with their counterparts from `other`.
    ///
    /// Data types absent from `other` are dropped; every other data type
    /// keeps its current report.
    pub fn merge_report(&mut self, other: Report, data_types: &[DataType]) {
        self.data_type_reports
            .retain(|report| !data_types.contains(&report.data_type));
        for report in other.data_type_reports {
            if !data_types.contains(&report.data_type) {
                continue;
            }
            let index = self
                .data_type_reports
                .binary_search_by_key(&report.data_type, |existing| existing.data_type)
                .unwrap_or_else(|index| index);
            self.data_type_reports.insert(index, report);
        }
    }
}
