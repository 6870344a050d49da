//! Submission directories written to temporary storage.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use subval_model::{FileType, SubmissionFile};
use subval_validate::{DeletionManifest, KeyValidationInput};
use tempfile::TempDir;

pub const DONOR_HEADER: &str = "donor_id\tdonor_sex";
pub const SPECIMEN_HEADER: &str = "donor_id\tspecimen_id\tspecimen_type";
pub const SAMPLE_HEADER: &str = "analyzed_sample_id\tspecimen_id\tanalyzed_sample_type";
pub const SSM_M_HEADER: &str = "analysis_id\tanalyzed_sample_id\tmatched_sample_id\tplatform";
pub const SSM_P_HEADER: &str = "analysis_id\tanalyzed_sample_id\tmutation_type\treference_genome_allele\tcontrol_genotype\ttumour_genotype\tmutated_from_allele\tmutated_to_allele";

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `<sub>/<name>` with a header and rows.
    pub fn write(&self, sub: &str, name: &str, header: &str, rows: &[&str]) -> PathBuf {
        let dir = self.dir.path().join(sub);
        fs::create_dir_all(&dir).expect("create dir");
        let mut contents = String::from(header);
        contents.push('\n');
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        let path = dir.join(name);
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn submission_files(&self, sub: &str) -> Vec<SubmissionFile> {
        subval_ingest::discover_submission_files(&self.dir.path().join(sub))
            .expect("discover files")
    }

    /// Key validation input over every file in `new` and `existing`.
    pub fn key_input(&self, new: &str, existing: Option<&str>) -> KeyValidationInput {
        let new_files: BTreeMap<FileType, SubmissionFile> = self
            .submission_files(new)
            .into_iter()
            .filter_map(|file| file.file_type.map(|file_type| (file_type, file)))
            .collect();
        let existing_files = existing
            .map(|sub| {
                self.submission_files(sub)
                    .into_iter()
                    .filter_map(|file| file.file_type.map(|file_type| (file_type, file.path)))
                    .collect()
            })
            .unwrap_or_default();
        KeyValidationInput {
            new_files,
            existing_files,
            deletions: DeletionManifest::empty(),
        }
    }

    /// A complete, consistent clinical and SSM submission in `sub`.
    pub fn valid_submission(&self, sub: &str) {
        self.write(sub, "donor.txt", DONOR_HEADER, &["D1\tmale", "D2\tfemale"]);
        self.write(
            sub,
            "specimen.txt",
            SPECIMEN_HEADER,
            &["D1\tSP1\tnormal", "D2\tSP2\ttumour"],
        );
        self.write(
            sub,
            "sample.txt",
            SAMPLE_HEADER,
            &["SA1\tSP1\tdna", "SA2\tSP2\tdna"],
        );
        self.write(sub, "ssm_m.txt", SSM_M_HEADER, &["AN1\tSA2\tSA1\tillumina"]);
        self.write(
            sub,
            "ssm_p.txt",
            SSM_P_HEADER,
            &[
                "AN1\tSA2\tsnv\tA\tA/A\tA/G\tA\tG",
                "AN1\tSA2\tsnv\tC\tC/C\tC/T\tC\tT",
            ],
        );
    }
}
