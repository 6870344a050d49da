//! Key declarations per file type.
//!
//! Every file type declares up to three key kinds by column position:
//!
//! - primary key: must be unique across accepted and submitted data
//! - foreign key: must resolve to a primary key of the referenced file type
//! - secondary foreign key: optional reference, only checked when filled in
//!
//! plus whether the file takes part in a surjective relation, i.e. whether
//! every key of its referenced file type must be used by at least one row.
//!
//! | File type | PK | FK → referenced | Secondary FK | Surjection |
//! |-----------|----|-----------------|--------------|------------|
//! | DONOR     | 0  |                 |              |            |
//! | SPECIMEN  | 1  | 0 → DONOR       |              | simple     |
//! | SAMPLE    | 0  | 1 → SPECIMEN    |              | simple     |
//! | `*_M`     | 0,1 | 1 → SAMPLE     | 2 → SAMPLE   | complex    |
//! | `*_P`     | see below | 0,1 → `*_M` |          | simple     |
//! | `*_S`     |    | PK of `*_P` → `*_P` |          |            |
//!
//! Only ssm, cnsm, stsm and meth meta files declare the matched sample.
//! CNSM_P and METH_P have a three-column primary key, STSM_P a four-column
//! one; the other primary files have none.

use subval_model::FileType;

/// Values treated as "not provided" in submitted data.
pub const MISSING_CODES: [&str; 4] = ["-777", "-888", "-999", "NA"];

/// True when a field value is empty or one of the missing codes.
pub fn is_missing_value(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || MISSING_CODES.contains(&value)
}

/// Column names and positions forming one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFields {
    pub names: &'static [&'static str],
    pub indices: &'static [usize],
}

impl KeyFields {
    pub fn max_index(&self) -> usize {
        self.indices.iter().copied().max().unwrap_or(0)
    }
}

/// A foreign key and the file type it points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub fields: KeyFields,
    pub referenced: FileType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surjection {
    None,
    /// Every key of the referenced file must be used by this file.
    Simple,
    /// Every sample must be used by at least one meta file, across data types.
    Complex,
}

/// Key declaration of one file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub file_type: FileType,
    pub pk: Option<KeyFields>,
    pub fk: Option<Relation>,
    pub secondary_fk: Option<Relation>,
    pub surjection: Surjection,
}

impl KeySpec {
    /// Highest column index used by any key, i.e. the minimum row width - 1.
    pub fn max_index(&self) -> usize {
        [
            self.pk.map(|pk| pk.max_index()),
            self.fk.map(|fk| fk.fields.max_index()),
            self.secondary_fk.map(|fk| fk.fields.max_index()),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0)
    }

    /// `(index, name)` of every key column, sorted and de-duplicated.
    pub fn key_columns(&self) -> Vec<(usize, &'static str)> {
        let mut columns: Vec<(usize, &'static str)> = [
            self.pk,
            self.fk.map(|fk| fk.fields),
            self.secondary_fk.map(|fk| fk.fields),
        ]
        .into_iter()
        .flatten()
        .flat_map(|fields| {
            fields
                .indices
                .iter()
                .copied()
                .zip(fields.names.iter().copied())
        })
        .collect();
        columns.sort_unstable();
        columns.dedup();
        columns
    }

    /// Position in the processing order: a file type is processed after every
    /// file type its foreign key points to.
    pub fn dependency_level(&self) -> usize {
        match self.fk {
            Some(relation) => key_spec(relation.referenced).dependency_level() + 1,
            None => 0,
        }
    }
}

const DONOR_PK: KeyFields = KeyFields {
    names: &["donor_id"],
    indices: &[0],
};
const SPECIMEN_PK: KeyFields = KeyFields {
    names: &["specimen_id"],
    indices: &[1],
};
const SPECIMEN_FK: KeyFields = KeyFields {
    names: &["donor_id"],
    indices: &[0],
};
const SAMPLE_PK: KeyFields = KeyFields {
    names: &["analyzed_sample_id"],
    indices: &[0],
};
const SAMPLE_FK: KeyFields = KeyFields {
    names: &["specimen_id"],
    indices: &[1],
};
const META_PK: KeyFields = KeyFields {
    names: &["analysis_id", "analyzed_sample_id"],
    indices: &[0, 1],
};
const META_FK: KeyFields = KeyFields {
    names: &["analyzed_sample_id"],
    indices: &[1],
};
const META_SECONDARY_FK: KeyFields = KeyFields {
    names: &["matched_sample_id"],
    indices: &[2],
};
const CNSM_P_PK: KeyFields = KeyFields {
    names: &["analysis_id", "analyzed_sample_id", "mutation_id"],
    indices: &[0, 1, 2],
};
const STSM_P_PK: KeyFields = KeyFields {
    names: &["analysis_id", "analyzed_sample_id", "placement", "sv_id"],
    indices: &[0, 1, 2, 3],
};
const METH_P_PK: KeyFields = KeyFields {
    names: &["analysis_id", "analyzed_sample_id", "methylated_fragment_id"],
    indices: &[0, 1, 2],
};

fn meta(file_type: FileType, matched_sample: bool) -> KeySpec {
    KeySpec {
        file_type,
        pk: Some(META_PK),
        fk: Some(Relation {
            fields: META_FK,
            referenced: FileType::Sample,
        }),
        secondary_fk: matched_sample.then_some(Relation {
            fields: META_SECONDARY_FK,
            referenced: FileType::Sample,
        }),
        surjection: Surjection::Complex,
    }
}

fn primary(file_type: FileType, pk: Option<KeyFields>, meta: FileType) -> KeySpec {
    KeySpec {
        file_type,
        pk,
        fk: Some(Relation {
            fields: META_PK,
            referenced: meta,
        }),
        secondary_fk: None,
        surjection: Surjection::Simple,
    }
}

fn secondary(file_type: FileType, primary_pk: KeyFields, primary: FileType) -> KeySpec {
    KeySpec {
        file_type,
        pk: None,
        fk: Some(Relation {
            fields: primary_pk,
            referenced: primary,
        }),
        secondary_fk: None,
        surjection: Surjection::None,
    }
}

/// Key declaration for `file_type`.
pub fn key_spec(file_type: FileType) -> KeySpec {
    match file_type {
        FileType::Donor => KeySpec {
            file_type,
            pk: Some(DONOR_PK),
            fk: None,
            secondary_fk: None,
            surjection: Surjection::None,
        },
        FileType::Specimen => KeySpec {
            file_type,
            pk: Some(SPECIMEN_PK),
            fk: Some(Relation {
                fields: SPECIMEN_FK,
                referenced: FileType::Donor,
            }),
            secondary_fk: None,
            surjection: Surjection::Simple,
        },
        FileType::Sample => KeySpec {
            file_type,
            pk: Some(SAMPLE_PK),
            fk: Some(Relation {
                fields: SAMPLE_FK,
                referenced: FileType::Specimen,
            }),
            secondary_fk: None,
            surjection: Surjection::Simple,
        },
        FileType::SsmM | FileType::CnsmM | FileType::StsmM | FileType::MethM => {
            meta(file_type, true)
        }
        FileType::ExpM | FileType::PexpM | FileType::JcnM | FileType::SgvM => {
            meta(file_type, false)
        }
        FileType::SsmP => primary(file_type, None, FileType::SsmM),
        FileType::CnsmP => primary(file_type, Some(CNSM_P_PK), FileType::CnsmM),
        FileType::StsmP => primary(file_type, Some(STSM_P_PK), FileType::StsmM),
        FileType::MethP => primary(file_type, Some(METH_P_PK), FileType::MethM),
        FileType::ExpG => primary(file_type, None, FileType::ExpM),
        FileType::PexpP => primary(file_type, None, FileType::PexpM),
        FileType::JcnP => primary(file_type, None, FileType::JcnM),
        FileType::SgvP => primary(file_type, None, FileType::SgvM),
        FileType::CnsmS => secondary(file_type, CNSM_P_PK, FileType::CnsmP),
        FileType::StsmS => secondary(file_type, STSM_P_PK, FileType::StsmP),
        FileType::MethS => secondary(file_type, METH_P_PK, FileType::MethP),
    }
}

/// Whether a submission of the file's data type must include it.
pub fn is_required(file_type: FileType) -> bool {
    !matches!(
        file_type,
        FileType::CnsmS | FileType::StsmS | FileType::MethS
    )
}
