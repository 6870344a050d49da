//! Streaming reader for tab-separated submission files.
//!
//! Files have one header row followed by one data row per line. Fields are
//! split on tabs only: quote characters carry no meaning. Blank lines are
//! skipped. Rows are yielded one at a time so that arbitrarily large files
//! can be scanned in constant memory.
//!
//! Line numbers are 1-based and count the header, so the first data row is
//! line 2.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecordsIntoIter};
use tracing::{debug, info};

use crate::error::{IngestError, Result};

/// Default number of rows between progress log lines.
pub const DEFAULT_LOG_THRESHOLD: u64 = 1_000_000;

/// One data row with its source line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: u64,
    pub fields: Vec<String>,
}

impl Row {
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Iterator over the data rows of one file.
pub struct TsvReader {
    path: PathBuf,
    header: Vec<String>,
    records: StringRecordsIntoIter<BufReader<File>>,
    log_threshold: u64,
    rows_read: u64,
}

impl TsvReader {
    /// Opens a file and reads its header row.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| IngestError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(BufReader::new(file));
        let header = reader
            .headers()
            .map_err(|source| IngestError::tsv(path, source))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        debug!(path = %path.display(), "opened tab-separated file");
        Ok(Self {
            path: path.to_path_buf(),
            header,
            records: reader.into_records(),
            log_threshold: DEFAULT_LOG_THRESHOLD,
            rows_read: 0,
        })
    }

    /// Sets the number of rows between progress log lines (0 disables).
    #[must_use]
    pub fn with_log_threshold(mut self, threshold: u64) -> Self {
        self.log_threshold = threshold;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

impl Iterator for TsvReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(source) => return Some(Err(IngestError::tsv(&self.path, source))),
            };
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let line = record.position().map_or(0, csv::Position::line);
            self.rows_read += 1;
            if self.log_threshold > 0 && self.rows_read.is_multiple_of(self.log_threshold) {
                info!(
                    path = %self.path.display(),
                    rows = self.rows_read,
                    "reading rows"
                );
            }
            return Some(Ok(Row {
                line,
                fields: record.iter().map(str::to_string).collect(),
            }));
        }
    }
}

/// Reads only the header row of a file.
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    Ok(TsvReader::open(path)?.header)
}
