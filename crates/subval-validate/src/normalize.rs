//! Normalization of simple somatic mutation observations.
//!
//! Steps run in a fixed order over one lazy pass of the file:
//!
//! 1. [`count_rows`] (total at start)
//! 2. [`remove_duplicate_observations`]
//! 3. [`mask_sensitive_alleles`]
//! 4. [`rebuild_mutation`]
//! 5. [`count_rows`] (total at end)
//!
//! Each step borrows the counters it updates, so the counts are only
//! complete once the iterator has been drained.

use std::collections::HashSet;
use std::fs::{self, File};
use std::iter;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;
use subval_ingest::TsvReader;
use subval_model::{ErrorType, FILE_LEVEL_LINE, FileType, ReportError, SubmissionFile};
use tracing::{debug, info, warn};

use crate::error::{Result, ValidateError};

pub const DEFAULT_MAX_CONFIDENTIAL_RATIO: f64 = 0.1;

const ANALYSIS_ID: &str = "analysis_id";
const MUTATION: &str = "mutation";
const MARKING: &str = "marking";
const REFERENCE_GENOME_ALLELE: &str = "reference_genome_allele";
const CONTROL_GENOTYPE: &str = "control_genotype";
const TUMOUR_GENOTYPE: &str = "tumour_genotype";
const MUTATED_FROM_ALLELE: &str = "mutated_from_allele";
const MUTATED_TO_ALLELE: &str = "mutated_to_allele";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Marking {
    Open,
    Controlled,
    Masked,
}

impl Marking {
    pub fn as_str(self) -> &'static str {
        match self {
            Marking::Open => "OPEN",
            Marking::Controlled => "CONTROLLED",
            Marking::Masked => "MASKED",
        }
    }
}

/// One observation row, padded to the schema width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub line: u64,
    pub fields: Vec<String>,
    pub marking: Marking,
}

/// Column positions used by the normalization steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSchema {
    header: Vec<String>,
    analysis_id: usize,
    mutation: usize,
    reference_genome_allele: usize,
    control_genotype: usize,
    tumour_genotype: usize,
    mutated_from_allele: usize,
    mutated_to_allele: usize,
}

impl ObservationSchema {
    /// Resolves the columns from a header; a missing `mutation` column is
    /// appended. Returns `None` when any other column is absent.
    pub fn from_header(header: &[String]) -> Option<Self> {
        let mut header = header.to_vec();
        let position =
            |header: &[String], name: &str| header.iter().position(|column| column == name);
        let mutation = match position(&header, MUTATION) {
            Some(index) => index,
            None => {
                header.push(MUTATION.to_string());
                header.len() - 1
            }
        };
        Some(Self {
            analysis_id: position(&header, ANALYSIS_ID)?,
            mutation,
            reference_genome_allele: position(&header, REFERENCE_GENOME_ALLELE)?,
            control_genotype: position(&header, CONTROL_GENOTYPE)?,
            tumour_genotype: position(&header, TUMOUR_GENOTYPE)?,
            mutated_from_allele: position(&header, MUTATED_FROM_ALLELE)?,
            mutated_to_allele: position(&header, MUTATED_TO_ALLELE)?,
            header,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn observation(&self, line: u64, mut fields: Vec<String>) -> Observation {
        fields.resize(self.width(), String::new());
        Observation {
            line,
            fields,
            marking: Marking::Open,
        }
    }

    /// Every field except `analysis_id` and `mutation`.
    fn group_key(&self, observation: &Observation) -> Vec<String> {
        observation
            .fields
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != self.analysis_id && *index != self.mutation)
            .map(|(_, value)| value.clone())
            .collect()
    }
}

/// Counters filled while the normalized rows are consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct NormalizationReport {
    pub total_start: u64,
    pub unique_start: u64,
    pub dropped: u64,
    pub marked_as_controlled: u64,
    pub masked: u64,
    pub total_end: u64,
}

impl NormalizationReport {
    /// Share of the incoming observations that were marked controlled.
    pub fn controlled_ratio(&self) -> f64 {
        if self.total_start == 0 {
            0.0
        } else {
            self.marked_as_controlled as f64 / self.total_start as f64
        }
    }
}

pub fn count_rows<'a, I>(rows: I, counter: &'a mut u64) -> impl Iterator<Item = Observation> + 'a
where
    I: Iterator<Item = Observation> + 'a,
{
    rows.inspect(move |_| *counter += 1)
}

/// Keeps the first of every group of observations that only differ by
/// `analysis_id` or `mutation`.
pub fn remove_duplicate_observations<'a, I>(
    rows: I,
    schema: &'a ObservationSchema,
    unique: &'a mut u64,
    dropped: &'a mut u64,
) -> impl Iterator<Item = Observation> + 'a
where
    I: Iterator<Item = Observation> + 'a,
{
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    rows.filter(move |observation| {
        if seen.insert(schema.group_key(observation)) {
            *unique += 1;
            true
        } else {
            debug!(line = observation.line, "dropped duplicate observation");
            *dropped += 1;
            false
        }
    })
}

/// Marks observations whose reference allele differs from the
/// `mutated_from_allele` as controlled, and follows each controlled row whose
/// reference allele also differs from `mutated_to_allele` with a masked copy.
pub fn mask_sensitive_alleles<'a, I>(
    rows: I,
    schema: &'a ObservationSchema,
    controlled: &'a mut u64,
    masked: &'a mut u64,
) -> impl Iterator<Item = Observation> + 'a
where
    I: Iterator<Item = Observation> + 'a,
{
    rows.flat_map(move |mut observation| {
        let reference = observation.fields[schema.reference_genome_allele].clone();
        let mut copy = None;
        if reference != observation.fields[schema.mutated_from_allele] {
            observation.marking = Marking::Controlled;
            *controlled += 1;
            if reference != observation.fields[schema.mutated_to_allele] {
                let mut masked_row = observation.clone();
                masked_row.marking = Marking::Masked;
                masked_row.fields[schema.control_genotype].clear();
                masked_row.fields[schema.tumour_genotype].clear();
                masked_row.fields[schema.mutated_from_allele] = reference;
                *masked += 1;
                copy = Some(masked_row);
            }
        }
        iter::once(observation).chain(copy)
    })
}

/// Sets `mutation` to `<from>><to>`.
pub fn rebuild_mutation<'a, I>(
    rows: I,
    schema: &'a ObservationSchema,
) -> impl Iterator<Item = Observation> + 'a
where
    I: Iterator<Item = Observation> + 'a,
{
    rows.map(move |mut observation| {
        observation.fields[schema.mutation] = format!(
            "{}>{}",
            observation.fields[schema.mutated_from_allele],
            observation.fields[schema.mutated_to_allele]
        );
        observation
    })
}

/// Runs every step over `rows` and hands each resulting observation to `sink`.
pub fn normalize_rows<I, F>(
    rows: I,
    schema: &ObservationSchema,
    mut sink: F,
) -> Result<NormalizationReport>
where
    I: Iterator<Item = Observation>,
    F: FnMut(Observation) -> Result<()>,
{
    let mut report = NormalizationReport::default();
    let NormalizationReport {
        total_start,
        unique_start,
        dropped,
        marked_as_controlled,
        masked,
        total_end,
    } = &mut report;
    let rows = count_rows(rows, total_start);
    let rows = remove_duplicate_observations(rows, schema, unique_start, dropped);
    let rows = mask_sensitive_alleles(rows, schema, marked_as_controlled, masked);
    let rows = rebuild_mutation(rows, schema);
    for observation in count_rows(rows, total_end) {
        sink(observation)?;
    }
    Ok(report)
}

/// Normalization settings.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationConfig {
    pub max_confidential_ratio: f64,
    /// Directory receiving the normalized files; nothing is written when unset.
    pub output_dir: Option<PathBuf>,
    pub log_threshold: u64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            max_confidential_ratio: DEFAULT_MAX_CONFIDENTIAL_RATIO,
            output_dir: None,
            log_threshold: subval_ingest::DEFAULT_LOG_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationOutcome {
    pub report: NormalizationReport,
    pub errors: Vec<ReportError>,
    pub output: Option<PathBuf>,
}

/// Normalizes one SSM primary file.
///
/// Returns `None` when the header lacks the observation columns.
pub fn normalize_file(
    file: &SubmissionFile,
    config: &NormalizationConfig,
) -> Result<Option<NormalizationOutcome>> {
    let reader = TsvReader::open(&file.path)?.with_log_threshold(config.log_threshold);
    let Some(schema) = ObservationSchema::from_header(reader.header()) else {
        warn!(file = %file.name, "observation columns missing, normalization skipped");
        return Ok(None);
    };

    let mut read_error = None;
    let rows = reader.map_while(|row| match row {
        Ok(row) => Some(schema.observation(row.line, row.fields)),
        Err(err) => {
            read_error = Some(err);
            None
        }
    });

    let (report, output) = match &config.output_dir {
        Some(dir) => {
            let path = dir.join(&file.name);
            let report = write_normalized(rows, &schema, dir, &path)?;
            (report, Some(path))
        }
        None => (normalize_rows(rows, &schema, |_| Ok(()))?, None),
    };
    if let Some(err) = read_error {
        return Err(err.into());
    }

    let mut errors = Vec::new();
    let ratio = report.controlled_ratio();
    if ratio > config.max_confidential_ratio {
        warn!(file = %file.name, ratio, "too many confidential observations");
        errors.push(
            ReportError::new(
                file.name.as_str(),
                FileType::SsmP,
                ErrorType::TooManyConfidentialObservations,
                FILE_LEVEL_LINE,
            )
            .with_value(format!("{ratio:.4}"))
            .with_parameter("maxRatio", config.max_confidential_ratio.to_string())
            .with_parameter("markedAsControlled", report.marked_as_controlled.to_string())
            .with_parameter("totalStart", report.total_start.to_string()),
        );
    }
    info!(
        file = %file.name,
        total_start = report.total_start,
        dropped = report.dropped,
        controlled = report.marked_as_controlled,
        masked = report.masked,
        total_end = report.total_end,
        "normalization finished"
    );
    Ok(Some(NormalizationOutcome {
        report,
        errors,
        output,
    }))
}

fn write_normalized<I>(
    rows: I,
    schema: &ObservationSchema,
    dir: &Path,
    path: &Path,
) -> Result<NormalizationReport>
where
    I: Iterator<Item = Observation>,
{
    fs::create_dir_all(dir).map_err(|source| ValidateError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let file = File::create(path).map_err(|source| ValidateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(file);
    let write_error = |source| ValidateError::Write {
        path: path.to_path_buf(),
        source,
    };
    writer
        .write_record(schema.header().iter().map(String::as_str).chain([MARKING]))
        .map_err(write_error)?;
    let report = normalize_rows(rows, schema, |observation| {
        writer
            .write_record(
                observation
                    .fields
                    .iter()
                    .map(String::as_str)
                    .chain([observation.marking.as_str()]),
            )
            .map_err(write_error)
    })?;
    writer.flush().map_err(|source| ValidateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), rows = report.total_end, "wrote normalized rows");
    Ok(report)
}
