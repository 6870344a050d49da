use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of problem recorded in a file report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// A required file type is absent from the submission.
    MissingFile,
    /// More than one file matches the same file type.
    TooManyFiles,
    /// Header lacks a column referenced by a key declaration.
    FileHeader,
    /// Row has fewer fields than the key declaration needs.
    StructurallyInvalidRow,
    /// Primary key already present in previously accepted data.
    UniqueOriginal,
    /// Primary key repeated within the submitted file.
    UniqueNew,
    /// Foreign key does not resolve in the referenced file type.
    Relation,
    /// Secondary foreign key does not resolve in the referenced file type.
    SecondaryRelation,
    /// A referenced key is not used by any dependent row.
    Surjection,
    /// The deletion manifest itself is malformed.
    InvalidDeletion,
    /// A donor listed for deletion does not exist in accepted data.
    UnknownDeletedDonor,
    /// Too large a share of observations had to be marked controlled.
    TooManyConfidentialObservations,
}

impl ErrorType {
    pub fn description(self) -> &'static str {
        match self {
            ErrorType::MissingFile => "required file is missing",
            ErrorType::TooManyFiles => "more than one file for the same file type",
            ErrorType::FileHeader => "header is missing key columns",
            ErrorType::StructurallyInvalidRow => "row is too short to hold its keys",
            ErrorType::UniqueOriginal => "key already exists in accepted data",
            ErrorType::UniqueNew => "duplicate key in file",
            ErrorType::Relation => "key does not match a referenced row",
            ErrorType::SecondaryRelation => "secondary key does not match a referenced row",
            ErrorType::Surjection => "referenced key is not used by any dependent row",
            ErrorType::InvalidDeletion => "malformed deletion entry",
            ErrorType::UnknownDeletedDonor => "deleted donor does not exist",
            ErrorType::TooManyConfidentialObservations => {
                "too many observations marked as controlled"
            }
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
