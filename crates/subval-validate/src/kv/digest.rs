use std::collections::HashSet;
use std::path::Path;

use subval_ingest::TsvReader;
use subval_model::FileType;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::kv::dictionary::key_spec;
use crate::kv::keys::{KeyTuple, extract_row_keys};

/// Set of primary-key tuples of one file type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDigest {
    file_type: FileType,
    keys: HashSet<KeyTuple>,
}

impl KeyDigest {
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            keys: HashSet::new(),
        }
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn contains(&self, keys: &KeyTuple) -> bool {
        self.keys.contains(keys)
    }

    /// Adds a key; returns `false` if it was already present.
    pub fn insert(&mut self, keys: KeyTuple) -> bool {
        self.keys.insert(keys)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyTuple> {
        self.keys.iter()
    }
}

/// Reads the primary keys of previously accepted data.
///
/// The data is trusted: rows are not cross-checked, and rows too short to
/// hold a key are skipped. File types without a primary key produce an empty
/// digest.
pub fn build_existing_digest(
    file_type: FileType,
    path: &Path,
    log_threshold: u64,
) -> Result<KeyDigest> {
    let spec = key_spec(file_type);
    let mut digest = KeyDigest::new(file_type);
    if spec.pk.is_none() {
        debug!(%file_type, "no primary key declared, existing digest left empty");
        return Ok(digest);
    }
    let reader = TsvReader::open(path)?.with_log_threshold(log_threshold);
    let mut skipped = 0u64;
    for row in reader {
        let row = row?;
        match extract_row_keys(&spec, &row.fields) {
            Ok(keys) => {
                if let Some(pk) = keys.pk {
                    digest.insert(pk);
                }
            }
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(%file_type, path = %path.display(), skipped, "skipped short rows in accepted data");
    }
    info!(%file_type, keys = digest.len(), "built existing digest");
    Ok(digest)
}
