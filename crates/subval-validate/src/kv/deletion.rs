//! Donors scheduled for deletion.
//!
//! The manifest is a tab-separated file with a `donor_id` and a `data_types`
//! column. `data_types` is either `all` or a comma-separated list of data
//! type names. Every listed donor is left out of the key checks whatever
//! data types are listed. Its DONOR row and the SPECIMEN rows pointing at it
//! are skipped, and its accepted key is not expected in the new DONOR file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use subval_ingest::TsvReader;
use subval_model::{DataType, ErrorType, FileType, ReportError};
use tracing::{debug, info};

use crate::error::Result;
use crate::kv::digest::KeyDigest;
use crate::kv::keys::{KeyTuple, RowKeys};

pub const DELETION_FILE_NAME: &str = "deletions.txt";

const DONOR_ID_COLUMN: &str = "donor_id";
const DATA_TYPES_COLUMN: &str = "data_types";
const ALL_DATA_TYPES: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletedDataTypes {
    All,
    Listed(BTreeSet<DataType>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionManifest {
    file_name: String,
    donors: BTreeMap<String, DeletedDataTypes>,
}

impl DeletionManifest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.donors.is_empty()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn donors(&self) -> impl Iterator<Item = (&str, &DeletedDataTypes)> {
        self.donors
            .iter()
            .map(|(donor, data_types)| (donor.as_str(), data_types))
    }

    pub fn insert(&mut self, donor_id: impl Into<String>, data_types: DeletedDataTypes) {
        self.donors.insert(donor_id.into(), data_types);
    }

    pub fn donor_ids(&self) -> impl Iterator<Item = &str> {
        self.donors.keys().map(String::as_str)
    }

    fn lists(&self, keys: Option<&KeyTuple>) -> bool {
        match keys.map(KeyTuple::values) {
            Some([donor_id]) => self.donors.contains_key(donor_id),
            _ => false,
        }
    }

    /// Whether a row of `file_type` belongs to a deleted donor and must be
    /// left out of the key checks.
    pub fn covers(&self, file_type: FileType, keys: &RowKeys) -> bool {
        match file_type {
            FileType::Donor => self.lists(keys.pk.as_ref()),
            FileType::Specimen => self.lists(keys.fk.as_ref()),
            _ => false,
        }
    }

    /// Reads a manifest, collecting malformed entries as report errors.
    ///
    /// Malformed rows are left out of the manifest.
    pub fn load(path: &Path) -> Result<(DeletionManifest, Vec<ReportError>)> {
        let file_name = path.file_name().map_or_else(
            || DELETION_FILE_NAME.to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        let reader = TsvReader::open(path)?;
        let mut manifest = DeletionManifest {
            file_name: file_name.clone(),
            donors: BTreeMap::new(),
        };
        let mut errors = Vec::new();
        let invalid = |line: u64, field: &str, value: &str, reason: &str| {
            ReportError::new(
                file_name.as_str(),
                FileType::Donor,
                ErrorType::InvalidDeletion,
                line,
            )
            .with_fields([field])
            .with_value(value)
            .with_parameter("reason", reason)
        };

        let (Some(donor_column), Some(types_column)) = (
            reader.column_index(DONOR_ID_COLUMN),
            reader.column_index(DATA_TYPES_COLUMN),
        ) else {
            errors.push(
                ReportError::new(file_name.as_str(), FileType::Donor, ErrorType::FileHeader, 1)
                    .with_fields([DONOR_ID_COLUMN, DATA_TYPES_COLUMN])
                    .with_value(reader.header().join(",")),
            );
            return Ok((manifest, errors));
        };

        for row in reader {
            let row = row?;
            let donor_id = row.field(donor_column).unwrap_or_default().trim();
            let raw_types = row.field(types_column).unwrap_or_default().trim();
            if donor_id.is_empty() {
                errors.push(invalid(row.line, DONOR_ID_COLUMN, donor_id, "missing donor id"));
                continue;
            }
            if manifest.donors.contains_key(donor_id) {
                errors.push(invalid(row.line, DONOR_ID_COLUMN, donor_id, "duplicate donor id"));
                continue;
            }
            match parse_data_types(raw_types) {
                Ok(data_types) => {
                    manifest.donors.insert(donor_id.to_string(), data_types);
                }
                Err(reason) => {
                    errors.push(invalid(row.line, DATA_TYPES_COLUMN, raw_types, reason));
                }
            }
        }
        info!(
            file = %manifest.file_name,
            donors = manifest.donors.len(),
            invalid = errors.len(),
            "loaded deletion manifest"
        );
        Ok((manifest, errors))
    }

    /// Reports deleted donors that are not part of the accepted DONOR data.
    pub fn unknown_donors(&self, existing_donors: &KeyDigest) -> Vec<ReportError> {
        self.donors
            .keys()
            .filter(|donor| !existing_donors.contains(&KeyTuple::new([donor.as_str()])))
            .map(|donor| {
                debug!(donor = %donor, "deleted donor not found in accepted data");
                ReportError::new(
                    self.file_name.as_str(),
                    FileType::Donor,
                    ErrorType::UnknownDeletedDonor,
                    0,
                )
                .with_fields([DONOR_ID_COLUMN])
                .with_value(donor.as_str())
            })
            .collect()
    }
}

fn parse_data_types(raw: &str) -> std::result::Result<DeletedDataTypes, &'static str> {
    let names: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return Err("missing data types");
    }
    if names.iter().any(|name| name.eq_ignore_ascii_case(ALL_DATA_TYPES)) {
        return if names.len() == 1 {
            Ok(DeletedDataTypes::All)
        } else {
            Err("'all' combined with other data types")
        };
    }
    let mut data_types = BTreeSet::new();
    for name in names {
        let data_type: DataType = name.parse().map_err(|_| "unknown data type")?;
        if !data_types.insert(data_type) {
            return Err("duplicate data type");
        }
    }
    Ok(DeletedDataTypes::Listed(data_types))
}
