//! Submission file discovery and file type matching.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use subval_model::{FileType, SubmissionFile};
use tracing::debug;

use crate::error::{IngestError, Result};

/// Lists all `.txt` files in a submission directory.
///
/// Returns files sorted by filename.
pub fn list_submission_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_txt = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_txt {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Lists and classifies the files of a submission directory.
///
/// Files whose names match no file type are kept with `file_type: None` so
/// that callers can still show them.
pub fn discover_submission_files(dir: &Path) -> Result<Vec<SubmissionFile>> {
    let files: Vec<SubmissionFile> = list_submission_files(dir)?
        .into_iter()
        .map(SubmissionFile::new)
        .collect();
    debug!(
        dir = %dir.display(),
        files = files.len(),
        classified = files.iter().filter(|file| file.file_type.is_some()).count(),
        "discovered submission files"
    );
    Ok(files)
}

/// Groups classified files by file type; unclassified files are dropped.
pub fn group_by_file_type(files: &[SubmissionFile]) -> BTreeMap<FileType, Vec<SubmissionFile>> {
    let mut grouped: BTreeMap<FileType, Vec<SubmissionFile>> = BTreeMap::new();
    for file in files {
        if let Some(file_type) = file.file_type {
            grouped.entry(file_type).or_default().push(file.clone());
        }
    }
    grouped
}
