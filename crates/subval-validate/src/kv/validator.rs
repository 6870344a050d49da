//! Streaming primary/foreign key and surjection checks.
//!
//! Existing data is digested first (primary keys only, one worker per file
//! type). New files are then processed in dependency order: every file type
//! of one level runs on its own worker and only reads digests of lower
//! levels. The surjection pass runs once all levels have been joined.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::thread;

use subval_model::{FileType, ReportError, SubmissionFile};
use tracing::{Span, debug, info, info_span, trace, warn};

use crate::cancel::CancellationFlag;
use crate::error::{Result, ValidateError};
use crate::kv::deletion::DeletionManifest;
use crate::kv::dictionary::{Surjection, key_spec};
use crate::kv::digest::{KeyDigest, build_existing_digest};
use crate::kv::errors::{FileKeyErrors, KeyErrorKind};
use crate::kv::keys::{KeyTuple, extract_row_keys};
use crate::kv::surjection::missing_keys;

/// Files handed to one key validation run.
#[derive(Debug, Clone, Default)]
pub struct KeyValidationInput {
    /// Submitted files, at most one per file type.
    pub new_files: BTreeMap<FileType, SubmissionFile>,
    /// Previously accepted files, at most one per file type.
    pub existing_files: BTreeMap<FileType, PathBuf>,
    pub deletions: DeletionManifest,
}

#[derive(Debug, Clone, Default)]
pub struct KeyValidationResult {
    pub new_digests: BTreeMap<FileType, KeyDigest>,
    pub existing_digests: BTreeMap<FileType, KeyDigest>,
    pub file_errors: BTreeMap<FileType, FileKeyErrors>,
    /// Deleted donors unknown to the accepted data.
    pub deletion_errors: Vec<ReportError>,
    pub rows_checked: u64,
}

impl KeyValidationResult {
    pub fn error_count(&self) -> usize {
        let key_errors: usize = self.file_errors.values().map(FileKeyErrors::len).sum();
        key_errors + self.deletion_errors.len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn errors_for(&self, file_type: FileType) -> Option<&FileKeyErrors> {
        self.file_errors.get(&file_type)
    }

    pub fn into_report_errors(self) -> Vec<ReportError> {
        let mut errors: Vec<ReportError> = self
            .file_errors
            .values()
            .flat_map(FileKeyErrors::to_report_errors)
            .collect();
        errors.extend(self.deletion_errors);
        errors
    }
}

/// Output of one new-file worker.
struct NewFileDigest {
    digest: KeyDigest,
    errors: FileKeyErrors,
    /// Foreign key tuples of accepted rows, for the surjection pass.
    encountered: HashSet<KeyTuple>,
    rows: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyIntegrityValidator {
    log_threshold: u64,
}

impl Default for KeyIntegrityValidator {
    fn default() -> Self {
        Self::new(subval_ingest::DEFAULT_LOG_THRESHOLD)
    }
}

impl KeyIntegrityValidator {
    pub fn new(log_threshold: u64) -> Self {
        Self { log_threshold }
    }

    pub fn validate(
        &self,
        input: &KeyValidationInput,
        cancel: &CancellationFlag,
    ) -> Result<KeyValidationResult> {
        cancel.check()?;
        let mut result = KeyValidationResult {
            existing_digests: self.existing_digests(input)?,
            ..KeyValidationResult::default()
        };
        if !input.deletions.is_empty() {
            let empty = KeyDigest::new(FileType::Donor);
            let donors = result
                .existing_digests
                .get(&FileType::Donor)
                .unwrap_or(&empty);
            result.deletion_errors = input.deletions.unknown_donors(donors);
        }

        let mut levels: BTreeMap<usize, Vec<(FileType, &SubmissionFile)>> = BTreeMap::new();
        for (&file_type, file) in &input.new_files {
            levels
                .entry(key_spec(file_type).dependency_level())
                .or_default()
                .push((file_type, file));
        }

        let mut encountered: BTreeMap<FileType, HashSet<KeyTuple>> = BTreeMap::new();
        for (level, files) in levels {
            cancel.check()?;
            debug!(level, files = files.len(), "building new digests");
            let outputs = self.new_digests_for_level(&files, input, &result, cancel)?;
            for output in outputs {
                let file_type = output.digest.file_type();
                result.rows_checked += output.rows;
                if !output.errors.is_empty() {
                    result.file_errors.insert(file_type, output.errors);
                }
                encountered.insert(file_type, output.encountered);
                result.new_digests.insert(file_type, output.digest);
            }
        }

        cancel.check()?;
        self.check_surjection(input, &encountered, &mut result);
        info!(
            files = input.new_files.len(),
            rows = result.rows_checked,
            errors = result.error_count(),
            "key validation finished"
        );
        Ok(result)
    }

    /// Digests every accepted file concurrently and adds empty placeholders
    /// for the file types the new files touch but that have no accepted file.
    fn existing_digests(
        &self,
        input: &KeyValidationInput,
    ) -> Result<BTreeMap<FileType, KeyDigest>> {
        let parent = Span::current();
        let mut digests = thread::scope(|scope| {
            let handles: Vec<_> = input
                .existing_files
                .iter()
                .map(|(&file_type, path)| {
                    let parent = parent.clone();
                    let handle = scope.spawn(move || {
                        let _span =
                            info_span!(parent: &parent, "existing_digest", %file_type).entered();
                        build_existing_digest(file_type, path, self.log_threshold)
                    });
                    (file_type, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(file_type, handle)| -> Result<(FileType, KeyDigest)> {
                    let digest = handle
                        .join()
                        .map_err(|_| ValidateError::WorkerPanicked { file_type })??;
                    Ok((file_type, digest))
                })
                .collect::<Result<BTreeMap<FileType, KeyDigest>>>()
        })?;

        for &file_type in input.new_files.keys() {
            let spec = key_spec(file_type);
            let referenced = [spec.fk, spec.secondary_fk]
                .into_iter()
                .flatten()
                .map(|relation| relation.referenced);
            for file_type in std::iter::once(file_type).chain(referenced) {
                digests
                    .entry(file_type)
                    .or_insert_with(|| KeyDigest::new(file_type));
            }
        }
        Ok(digests)
    }

    fn new_digests_for_level(
        &self,
        files: &[(FileType, &SubmissionFile)],
        input: &KeyValidationInput,
        result: &KeyValidationResult,
        cancel: &CancellationFlag,
    ) -> Result<Vec<NewFileDigest>> {
        let parent = Span::current();
        thread::scope(|scope| {
            let handles: Vec<_> = files
                .iter()
                .map(|&(file_type, file)| {
                    let parent = parent.clone();
                    let handle = scope.spawn(move || {
                        let _span = info_span!(
                            parent: &parent,
                            "new_digest",
                            %file_type,
                            file = %file.name
                        )
                        .entered();
                        self.build_new_digest(file_type, file, input, result, cancel)
                    });
                    (file_type, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(file_type, handle)| -> Result<NewFileDigest> {
                    handle
                        .join()
                        .map_err(|_| ValidateError::WorkerPanicked { file_type })?
                })
                .collect()
        })
    }

    /// Reads one submitted file and applies the row rules in order:
    /// unique against accepted data, unique within the file, relation,
    /// secondary relation. A row failing a rule contributes no keys.
    fn build_new_digest(
        &self,
        file_type: FileType,
        file: &SubmissionFile,
        input: &KeyValidationInput,
        result: &KeyValidationResult,
        cancel: &CancellationFlag,
    ) -> Result<NewFileDigest> {
        cancel.check()?;
        let spec = key_spec(file_type);
        let resolves = |referenced: FileType, keys: &KeyTuple| {
            result
                .existing_digests
                .get(&referenced)
                .is_some_and(|digest| digest.contains(keys))
                || result
                    .new_digests
                    .get(&referenced)
                    .is_some_and(|digest| digest.contains(keys))
        };
        let existing = result.existing_digests.get(&file_type);

        let mut output = NewFileDigest {
            digest: KeyDigest::new(file_type),
            errors: FileKeyErrors::new(file_type, file.name.clone()),
            encountered: HashSet::new(),
            rows: 0,
        };
        let mut skipped = 0u64;
        let reader =
            subval_ingest::TsvReader::open(&file.path)?.with_log_threshold(self.log_threshold);
        for row in reader {
            let row = row?;
            output.rows += 1;
            let keys = match extract_row_keys(&spec, &row.fields) {
                Ok(keys) => keys,
                Err(short) => {
                    output.errors.push(
                        row.line,
                        KeyErrorKind::StructurallyInvalidRow,
                        KeyTuple::new([short.width.to_string()]),
                        None,
                    );
                    continue;
                }
            };
            if input.deletions.covers(file_type, &keys) {
                skipped += 1;
                continue;
            }

            if let Some(pk) = &keys.pk {
                if existing.is_some_and(|digest| digest.contains(pk)) {
                    trace!(line = row.line, keys = %pk, "primary key already accepted");
                    output
                        .errors
                        .push(row.line, KeyErrorKind::UniqueOriginal, pk.clone(), None);
                    continue;
                }
                if output.digest.contains(pk) {
                    trace!(line = row.line, keys = %pk, "duplicate primary key");
                    output
                        .errors
                        .push(row.line, KeyErrorKind::UniqueNew, pk.clone(), None);
                    continue;
                }
            }
            if let (Some(relation), Some(fk)) = (spec.fk, &keys.fk)
                && !resolves(relation.referenced, fk)
            {
                trace!(line = row.line, keys = %fk, "unresolved foreign key");
                output.errors.push(
                    row.line,
                    KeyErrorKind::Relation,
                    fk.clone(),
                    Some(relation.referenced),
                );
                continue;
            }
            if let (Some(relation), Some(secondary)) = (spec.secondary_fk, &keys.secondary_fk)
                && !resolves(relation.referenced, secondary)
            {
                trace!(line = row.line, keys = %secondary, "unresolved secondary foreign key");
                output.errors.push(
                    row.line,
                    KeyErrorKind::SecondaryRelation,
                    secondary.clone(),
                    Some(relation.referenced),
                );
                continue;
            }

            if let Some(pk) = keys.pk {
                output.digest.insert(pk);
            }
            output.encountered.extend(keys.fk);
            output.encountered.extend(keys.secondary_fk);
        }
        if skipped > 0 {
            debug!(%file_type, skipped, "rows of deleted donors skipped");
        }
        if !output.errors.is_empty() {
            warn!(
                %file_type,
                file = %file.name,
                errors = output.errors.len(),
                "key errors found"
            );
        }
        debug!(%file_type, rows = output.rows, keys = output.digest.len(), "built new digest");
        Ok(output)
    }

    /// Name under which errors of `file_type` are reported.
    fn report_file_name(input: &KeyValidationInput, file_type: FileType) -> String {
        input
            .new_files
            .get(&file_type)
            .map(|file| file.name.clone())
            .or_else(|| {
                input
                    .existing_files
                    .get(&file_type)
                    .and_then(|path| path.file_name())
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| format!("{file_type}.txt"))
    }

    fn check_surjection(
        &self,
        input: &KeyValidationInput,
        encountered: &BTreeMap<FileType, HashSet<KeyTuple>>,
        result: &mut KeyValidationResult,
    ) {
        let deleted_donors: HashSet<KeyTuple> = input
            .deletions
            .donor_ids()
            .map(|donor| KeyTuple::new([donor]))
            .collect();
        let mut complex_encountered: HashSet<KeyTuple> = HashSet::new();
        let mut complex_present = false;
        let mut missing: Vec<(FileType, Option<FileType>, Vec<KeyTuple>)> = Vec::new();

        for (&file_type, keys) in encountered {
            let spec = key_spec(file_type);
            let Some(relation) = spec.fk else {
                continue;
            };
            match spec.surjection {
                Surjection::None => {}
                Surjection::Simple => {
                    let referenced = relation.referenced;
                    let expected = result
                        .existing_digests
                        .get(&referenced)
                        .into_iter()
                        .chain(result.new_digests.get(&referenced))
                        .flat_map(KeyDigest::iter)
                        .filter(|key| {
                            referenced != FileType::Donor || !deleted_donors.contains(*key)
                        });
                    let keys = missing_keys(expected, keys);
                    if !keys.is_empty() {
                        missing.push((referenced, Some(file_type), keys));
                    }
                }
                Surjection::Complex => {
                    complex_present = true;
                    complex_encountered.extend(keys.iter().cloned());
                }
            }
        }

        if complex_present {
            let expected = result
                .existing_digests
                .get(&FileType::Sample)
                .into_iter()
                .chain(result.new_digests.get(&FileType::Sample))
                .flat_map(KeyDigest::iter);
            let keys = missing_keys(expected, &complex_encountered);
            if !keys.is_empty() {
                missing.push((FileType::Sample, None, keys));
            }
        }

        for (referenced, referencing, keys) in missing {
            info!(
                %referenced,
                referencing = ?referencing,
                missing = keys.len(),
                "surjection violated"
            );
            let errors = result.file_errors.entry(referenced).or_insert_with(|| {
                FileKeyErrors::new(referenced, Self::report_file_name(input, referenced))
            });
            for key in keys {
                errors.push(0, KeyErrorKind::Surjection, key, referencing);
            }
        }
    }
}
