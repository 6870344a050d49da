use std::path::Path;

use subval_ingest::TsvReader;
use subval_model::FieldReport;

use crate::error::Result;
use crate::kv::is_missing_value;

/// Counts populated and missing values for every header column.
///
/// Fields absent from a short row count as missing.
pub fn summarize_fields(path: &Path, log_threshold: u64) -> Result<Vec<FieldReport>> {
    let reader = TsvReader::open(path)?.with_log_threshold(log_threshold);
    let mut reports: Vec<FieldReport> = reader
        .header()
        .iter()
        .map(|name| FieldReport {
            name: name.clone(),
            populated: 0,
            missing: 0,
        })
        .collect();
    for row in reader {
        let row = row?;
        for (index, report) in reports.iter_mut().enumerate() {
            match row.field(index) {
                Some(value) if !is_missing_value(value) => report.populated += 1,
                _ => report.missing += 1,
            }
        }
    }
    Ok(reports)
}
