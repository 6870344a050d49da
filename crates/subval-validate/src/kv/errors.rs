//! Per-file collection of key integrity errors.

use subval_model::{ErrorType, FileType, ReportError};

use crate::kv::dictionary::key_spec;
use crate::kv::keys::KeyTuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyErrorKind {
    UniqueOriginal,
    UniqueNew,
    Relation,
    SecondaryRelation,
    Surjection,
    /// The row has fewer columns than its key declaration needs.
    StructurallyInvalidRow,
}

impl KeyErrorKind {
    pub fn error_type(self) -> ErrorType {
        match self {
            KeyErrorKind::UniqueOriginal => ErrorType::UniqueOriginal,
            KeyErrorKind::UniqueNew => ErrorType::UniqueNew,
            KeyErrorKind::Relation => ErrorType::Relation,
            KeyErrorKind::SecondaryRelation => ErrorType::SecondaryRelation,
            KeyErrorKind::Surjection => ErrorType::Surjection,
            KeyErrorKind::StructurallyInvalidRow => ErrorType::StructurallyInvalidRow,
        }
    }
}

/// One offending row (or, for surjection, one unused key). For
/// `StructurallyInvalidRow` the tuple holds the number of columns found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyError {
    pub line: u64,
    pub kind: KeyErrorKind,
    pub keys: KeyTuple,
    /// Referenced file type for relation errors, referencing file type for
    /// simple surjection errors.
    pub related: Option<FileType>,
}

/// Errors found in one file, in detection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKeyErrors {
    pub file_type: FileType,
    pub file_name: String,
    pub errors: Vec<KeyError>,
}

impl FileKeyErrors {
    pub fn new(file_type: FileType, file_name: impl Into<String>) -> Self {
        Self {
            file_type,
            file_name: file_name.into(),
            errors: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        line: u64,
        kind: KeyErrorKind,
        keys: KeyTuple,
        related: Option<FileType>,
    ) {
        self.errors.push(KeyError {
            line,
            kind,
            keys,
            related,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn count(&self, kind: KeyErrorKind) -> usize {
        self.errors.iter().filter(|error| error.kind == kind).count()
    }

    /// Converts the collected errors into report entries for this file.
    pub fn to_report_errors(&self) -> Vec<ReportError> {
        let spec = key_spec(self.file_type);
        self.errors
            .iter()
            .map(|error| {
                let names: &[&str] = match error.kind {
                    KeyErrorKind::UniqueOriginal
                    | KeyErrorKind::UniqueNew
                    | KeyErrorKind::Surjection => {
                        spec.pk.map(|pk| pk.names).unwrap_or_default()
                    }
                    KeyErrorKind::Relation => {
                        spec.fk.map(|fk| fk.fields.names).unwrap_or_default()
                    }
                    KeyErrorKind::SecondaryRelation => spec
                        .secondary_fk
                        .map(|fk| fk.fields.names)
                        .unwrap_or_default(),
                    KeyErrorKind::StructurallyInvalidRow => &[],
                };
                let mut report = ReportError::new(
                    self.file_name.clone(),
                    self.file_type,
                    error.kind.error_type(),
                    error.line,
                )
                .with_fields(names.iter().copied())
                .with_value(error.keys.to_string());
                match (error.kind, error.related) {
                    (KeyErrorKind::Relation | KeyErrorKind::SecondaryRelation, Some(referenced)) => {
                        report = report.with_parameter("referencedFileType", referenced.as_str());
                    }
                    (KeyErrorKind::Surjection, Some(referencing)) => {
                        report = report.with_parameter("referencingFileType", referencing.as_str());
                    }
                    _ => {}
                }
                report
            })
            .collect()
    }
}
