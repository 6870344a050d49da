//! Data types and the file types that make them up.
//!
//! A submission is organised by data type (clinical plus one entry per
//! experimental feature), and each data type is made of a fixed set of file
//! types. Feature types follow a meta/primary/secondary layout:
//!
//! - `*_M`: one row per analysis, links an analysis to an analyzed sample
//! - `*_P`: primary observations of the analysis
//! - `*_S`: secondary observations attached to a primary observation
//!
//! Expression (`EXP_G`) is the only primary file not suffixed with `_P`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Top-level grouping of submission files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Clinical,
    Ssm,
    Cnsm,
    Stsm,
    Meth,
    Exp,
    Pexp,
    Jcn,
    Sgv,
}

impl DataType {
    pub const ALL: [DataType; 9] = [
        DataType::Clinical,
        DataType::Ssm,
        DataType::Cnsm,
        DataType::Stsm,
        DataType::Meth,
        DataType::Exp,
        DataType::Pexp,
        DataType::Jcn,
        DataType::Sgv,
    ];

    /// Lowercase identifier as used in deletion manifests and CLI arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Clinical => "clinical",
            DataType::Ssm => "ssm",
            DataType::Cnsm => "cnsm",
            DataType::Stsm => "stsm",
            DataType::Meth => "meth",
            DataType::Exp => "exp",
            DataType::Pexp => "pexp",
            DataType::Jcn => "jcn",
            DataType::Sgv => "sgv",
        }
    }

    pub fn is_feature(self) -> bool {
        self != DataType::Clinical
    }

    /// File types belonging to this data type, in dependency order.
    pub fn file_types(self) -> &'static [FileType] {
        match self {
            DataType::Clinical => &[FileType::Donor, FileType::Specimen, FileType::Sample],
            DataType::Ssm => &[FileType::SsmM, FileType::SsmP],
            DataType::Cnsm => &[FileType::CnsmM, FileType::CnsmP, FileType::CnsmS],
            DataType::Stsm => &[FileType::StsmM, FileType::StsmP, FileType::StsmS],
            DataType::Meth => &[FileType::MethM, FileType::MethP, FileType::MethS],
            DataType::Exp => &[FileType::ExpM, FileType::ExpG],
            DataType::Pexp => &[FileType::PexpM, FileType::PexpP],
            DataType::Jcn => &[FileType::JcnM, FileType::JcnP],
            DataType::Sgv => &[FileType::SgvM, FileType::SgvP],
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        DataType::ALL
            .into_iter()
            .find(|dt| dt.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ModelError::UnknownDataType(needle.to_string()))
    }
}

/// Kind of submission file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    Donor,
    Specimen,
    Sample,
    SsmM,
    SsmP,
    CnsmM,
    CnsmP,
    CnsmS,
    StsmM,
    StsmP,
    StsmS,
    MethM,
    MethP,
    MethS,
    ExpM,
    ExpG,
    PexpM,
    PexpP,
    JcnM,
    JcnP,
    SgvM,
    SgvP,
}

impl FileType {
    pub const ALL: [FileType; 22] = [
        FileType::Donor,
        FileType::Specimen,
        FileType::Sample,
        FileType::SsmM,
        FileType::SsmP,
        FileType::CnsmM,
        FileType::CnsmP,
        FileType::CnsmS,
        FileType::StsmM,
        FileType::StsmP,
        FileType::StsmS,
        FileType::MethM,
        FileType::MethP,
        FileType::MethS,
        FileType::ExpM,
        FileType::ExpG,
        FileType::PexpM,
        FileType::PexpP,
        FileType::JcnM,
        FileType::JcnP,
        FileType::SgvM,
        FileType::SgvP,
    ];

    /// Lowercase file name prefix (e.g. `ssm_m`).
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Donor => "donor",
            FileType::Specimen => "specimen",
            FileType::Sample => "sample",
            FileType::SsmM => "ssm_m",
            FileType::SsmP => "ssm_p",
            FileType::CnsmM => "cnsm_m",
            FileType::CnsmP => "cnsm_p",
            FileType::CnsmS => "cnsm_s",
            FileType::StsmM => "stsm_m",
            FileType::StsmP => "stsm_p",
            FileType::StsmS => "stsm_s",
            FileType::MethM => "meth_m",
            FileType::MethP => "meth_p",
            FileType::MethS => "meth_s",
            FileType::ExpM => "exp_m",
            FileType::ExpG => "exp_g",
            FileType::PexpM => "pexp_m",
            FileType::PexpP => "pexp_p",
            FileType::JcnM => "jcn_m",
            FileType::JcnP => "jcn_p",
            FileType::SgvM => "sgv_m",
            FileType::SgvP => "sgv_p",
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            FileType::Donor | FileType::Specimen | FileType::Sample => DataType::Clinical,
            FileType::SsmM | FileType::SsmP => DataType::Ssm,
            FileType::CnsmM | FileType::CnsmP | FileType::CnsmS => DataType::Cnsm,
            FileType::StsmM | FileType::StsmP | FileType::StsmS => DataType::Stsm,
            FileType::MethM | FileType::MethP | FileType::MethS => DataType::Meth,
            FileType::ExpM | FileType::ExpG => DataType::Exp,
            FileType::PexpM | FileType::PexpP => DataType::Pexp,
            FileType::JcnM | FileType::JcnP => DataType::Jcn,
            FileType::SgvM | FileType::SgvP => DataType::Sgv,
        }
    }

    /// Matches submission file names such as `ssm_p.txt` or `donor.2024-01.txt`.
    pub fn matches_file_name(self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        let Some(rest) = lower.strip_prefix(self.as_str()) else {
            return false;
        };
        rest.starts_with('.') && rest.ends_with(".txt")
    }

    /// Classifies a file name, returning `None` for unrecognised names.
    pub fn from_file_name(file_name: &str) -> Option<FileType> {
        FileType::ALL
            .into_iter()
            .find(|ft| ft.matches_file_name(file_name))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        FileType::ALL
            .into_iter()
            .find(|ft| ft.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ModelError::UnknownFileType(needle.to_string()))
    }
}
