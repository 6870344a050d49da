//! One validation run over a submission directory.
//!
//! Structural checks, key integrity, normalization and field summaries run
//! in that order against a single `Report`. Row-level problems end up in the
//! report; only I/O failures, worker panics and stop requests surface as
//! `Err`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use subval_ingest::{discover_submission_files, group_by_file_type};
use subval_model::{DataType, FileType, Report, ReportError, SubmissionFile};
use tracing::{debug, info, info_span, warn};

use crate::cancel::CancellationFlag;
use crate::error::Result;
use crate::kv::{DeletionManifest, KeyIntegrityValidator, KeyValidationInput};
use crate::normalize::{NormalizationConfig, normalize_file};
use crate::structure::{ValidationPlan, plan_validation};
use crate::summary::summarize_fields;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub log_threshold: u64,
    pub normalization: NormalizationConfig,
}

impl PipelineConfig {
    pub fn new(log_threshold: u64) -> Self {
        Self {
            log_threshold,
            normalization: NormalizationConfig {
                log_threshold,
                ..NormalizationConfig::default()
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(subval_ingest::DEFAULT_LOG_THRESHOLD)
    }
}

/// Everything needed to validate one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRequest {
    pub project_key: String,
    pub data_types: Vec<DataType>,
    pub files: Vec<SubmissionFile>,
    /// Directory holding the project's previously accepted files.
    pub existing_dir: Option<PathBuf>,
    /// Deletion manifest path.
    pub deletions: Option<PathBuf>,
}

impl ValidationRequest {
    /// Report with every file listed and the requested data types validating.
    pub fn initial_report(&self) -> Report {
        let mut report = Report::from_files(&self.files);
        report.notify_validating(&self.data_types);
        report
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Every stage ran; the report may still carry row errors.
    Completed(Report),
    /// Required files were missing or malformed; no row was checked.
    StructurallyInvalid(Report),
}

impl PipelineOutcome {
    pub fn report(&self) -> &Report {
        match self {
            PipelineOutcome::Completed(report) | PipelineOutcome::StructurallyInvalid(report) => {
                report
            }
        }
    }

    pub fn into_report(self) -> Report {
        match self {
            PipelineOutcome::Completed(report) | PipelineOutcome::StructurallyInvalid(report) => {
                report
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationPipeline {
    config: PipelineConfig,
}

impl ValidationPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(
        &self,
        request: &ValidationRequest,
        mut report: Report,
        cancel: &CancellationFlag,
    ) -> Result<PipelineOutcome> {
        let _span = info_span!("pipeline", project = %request.project_key).entered();
        cancel.check()?;

        let plan = match plan_validation(&request.files, &request.data_types) {
            Ok(plan) => plan,
            Err(failure) => {
                add_errors(&mut report, failure.errors);
                report.refresh_state();
                return Ok(PipelineOutcome::StructurallyInvalid(report));
            }
        };

        let (deletions, deletion_errors) = match &request.deletions {
            Some(path) => DeletionManifest::load(path)?,
            None => (DeletionManifest::empty(), Vec::new()),
        };
        add_errors(&mut report, deletion_errors);

        let input = KeyValidationInput {
            new_files: plan.files.clone(),
            existing_files: self.existing_files(request)?,
            deletions,
        };
        let validator = KeyIntegrityValidator::new(self.config.log_threshold);
        let result = validator.validate(&input, cancel)?;
        let keys_clean = !result.has_errors();
        add_errors(&mut report, result.into_report_errors());

        if keys_clean && let Some(file) = plan.files.get(&FileType::SsmP) {
            cancel.check()?;
            if let Some(outcome) = normalize_file(file, &self.config.normalization)? {
                add_errors(&mut report, outcome.errors);
            }
        }

        self.summarize(&plan, &mut report, cancel)?;
        report.refresh_state();
        info!(
            project = %request.project_key,
            errors = report.error_count(),
            "validation pipeline finished"
        );
        Ok(PipelineOutcome::Completed(report))
    }

    /// Accepted files of the project, first match per file type.
    fn existing_files(&self, request: &ValidationRequest) -> Result<BTreeMap<FileType, PathBuf>> {
        let Some(dir) = &request.existing_dir else {
            return Ok(BTreeMap::new());
        };
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "no accepted data");
            return Ok(BTreeMap::new());
        }
        let files = discover_submission_files(dir)?;
        Ok(group_by_file_type(&files)
            .into_iter()
            .filter_map(|(file_type, files)| {
                if files.len() > 1 {
                    warn!(
                        %file_type,
                        count = files.len(),
                        "several accepted files, using the first"
                    );
                }
                files.into_iter().next().map(|file| (file_type, file.path))
            })
            .collect())
    }

    fn summarize(
        &self,
        plan: &ValidationPlan,
        report: &mut Report,
        cancel: &CancellationFlag,
    ) -> Result<()> {
        for file in plan.files.values() {
            cancel.check()?;
            let fields = summarize_fields(&file.path, self.config.log_threshold)?;
            report.set_field_reports(&file.name, fields);
        }
        Ok(())
    }
}

fn add_errors(report: &mut Report, errors: Vec<ReportError>) {
    for error in errors {
        report.add_error(error);
    }
}
