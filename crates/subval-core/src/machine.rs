//! Submission lifecycle.
//!
//! One flat state enum, a lookup table of allowed operations per state
//! (`operation::allowed_operations`), and the operations below. Every
//! operation checks the table first and fails with
//! `StateError::InvalidStateOperation` when the current state does not
//! accept it.
//!
//! ```text
//! NOT_VALIDATED ──queue──▶ QUEUED ──start──▶ VALIDATING ──finish──▶ VALID / INVALID / ERROR
//!       ▲                    │                   │                    │
//!       └──────cancel────────┘                   │ (cancel deferred)  └──signOff──▶ SIGNED_OFF
//! ```

use std::collections::BTreeSet;

use subval_model::{
    DataType, FileType, Outcome, Report, Submission, SubmissionFile, SubmissionState,
};
use tracing::{debug, info};

use crate::context::StateContext;
use crate::error::{Result, StateError};
use crate::operation::{Operation, is_allowed};

/// What happens to a submission when its release closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosePolicy {
    /// Carry state and report into the next release.
    Preserve,
    /// Start over as `NOT_VALIDATED` with a report rebuilt from the files.
    Reset,
}

impl ClosePolicy {
    /// Policy declared by a state: settled valid submissions are preserved.
    pub fn declared_for(state: SubmissionState) -> ClosePolicy {
        match state {
            SubmissionState::Valid | SubmissionState::SignedOff => ClosePolicy::Preserve,
            _ => ClosePolicy::Reset,
        }
    }
}

/// A change in the submission directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub file_name: String,
    pub file_type: Option<FileType>,
}

impl FileEvent {
    pub fn new(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let file_type = FileType::from_file_name(&file_name);
        Self {
            file_name,
            file_type,
        }
    }
}

impl From<&SubmissionFile> for FileEvent {
    fn from(file: &SubmissionFile) -> Self {
        Self {
            file_name: file.name.clone(),
            file_type: file.file_type,
        }
    }
}

/// State derived from a report: valid, invalid, or not yet validated.
pub fn next_state(report: &Report) -> SubmissionState {
    if report.is_valid() {
        SubmissionState::Valid
    } else if report.has_errors() {
        SubmissionState::Invalid
    } else {
        SubmissionState::NotValidated
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SubmissionStateMachine;

impl SubmissionStateMachine {
    pub fn new() -> Self {
        Self
    }

    fn check(&self, context: &dyn StateContext, operation: Operation) -> Result<()> {
        let state = context.state();
        if is_allowed(state, operation) {
            Ok(())
        } else {
            Err(StateError::InvalidStateOperation { state, operation })
        }
    }

    fn transition(
        &self,
        context: &mut dyn StateContext,
        next: SubmissionState,
        operation: Operation,
    ) {
        let previous = context.state();
        context.set_state(next);
        if previous != next {
            info!(
                project = context.project_key(),
                from = %previous,
                to = %next,
                %operation,
                "submission state changed"
            );
        }
    }

    /// Refreshes the report after a file was added, replaced or removed.
    pub fn modify_file(&self, context: &mut dyn StateContext, event: &FileEvent) -> Result<()> {
        self.check(context, Operation::ModifyFile)?;
        let files = context.submission_files().to_vec();
        let mut affected: BTreeSet<DataType> = context.report_mut().refresh_files(&files);
        if let Some(file_type) = event.file_type {
            affected.insert(file_type.data_type());
        }
        let affected: Vec<DataType> = affected.into_iter().collect();
        debug!(
            project = context.project_key(),
            file = %event.file_name,
            data_types = ?affected,
            "file modified"
        );
        context.report_mut().reset_data_types(&affected);
        let next = next_state(context.report());
        self.transition(context, next, Operation::ModifyFile);
        Ok(())
    }

    pub fn queue_request(
        &self,
        context: &mut dyn StateContext,
        data_types: &[DataType],
    ) -> Result<()> {
        self.check(context, Operation::QueueRequest)?;
        let report = context.report_mut();
        report.reset_data_types(data_types);
        report.notify_queued(data_types);
        self.transition(context, SubmissionState::Queued, Operation::QueueRequest);
        Ok(())
    }

    /// Marks the data types as validating in both the live and the incoming report.
    pub fn start_validation(
        &self,
        context: &mut dyn StateContext,
        data_types: &[DataType],
        new_report: &mut Report,
    ) -> Result<()> {
        self.check(context, Operation::StartValidation)?;
        let files = context.submission_files().to_vec();
        for report in [&mut *context.report_mut(), &mut *new_report] {
            report.refresh_files(&files);
            report.reset_data_types(data_types);
            report.notify_validating(data_types);
        }
        self.transition(
            context,
            SubmissionState::Validating,
            Operation::StartValidation,
        );
        Ok(())
    }

    /// From `QUEUED`, drops the request immediately. From `VALIDATING` this
    /// does nothing: the running validation resolves through
    /// `finish_validation` with `Outcome::Cancelled`.
    pub fn cancel_validation(
        &self,
        context: &mut dyn StateContext,
        data_types: &[DataType],
    ) -> Result<()> {
        self.check(context, Operation::CancelValidation)?;
        if context.state() == SubmissionState::Validating {
            debug!(
                project = context.project_key(),
                "cancellation deferred to validation completion"
            );
            return Ok(());
        }
        context.report_mut().reset_data_types(data_types);
        let next = next_state(context.report());
        self.transition(context, next, Operation::CancelValidation);
        Ok(())
    }

    pub fn finish_validation(
        &self,
        context: &mut dyn StateContext,
        data_types: &[DataType],
        outcome: Outcome,
        mut new_report: Report,
    ) -> Result<()> {
        self.check(context, Operation::FinishValidation)?;
        let next = match outcome {
            Outcome::Aborted | Outcome::Cancelled => {
                new_report.reset_data_types(data_types);
                context.report_mut().merge_report(new_report, data_types);
                next_state(context.report())
            }
            Outcome::Completed => {
                new_report.refresh_state();
                context.report_mut().merge_report(new_report, data_types);
                if context.report().has_errors() {
                    SubmissionState::Invalid
                } else {
                    SubmissionState::Valid
                }
            }
            Outcome::Failed => {
                context.report_mut().notify_error(data_types);
                SubmissionState::Error
            }
        };
        info!(
            project = context.project_key(),
            %outcome,
            errors = context.report().error_count(),
            "validation finished"
        );
        self.transition(context, next, Operation::FinishValidation);
        Ok(())
    }

    pub fn sign_off(&self, context: &mut dyn StateContext) -> Result<()> {
        self.check(context, Operation::SignOff)?;
        self.transition(context, SubmissionState::SignedOff, Operation::SignOff);
        Ok(())
    }

    /// Builds the submission record carried into `next_release`.
    ///
    /// Callers normally pass `ClosePolicy::declared_for(context.state())`.
    pub fn close_release(
        &self,
        context: &dyn StateContext,
        next_release: &str,
        policy: ClosePolicy,
    ) -> Result<Submission> {
        self.check(context, Operation::CloseRelease)?;
        let mut submission = Submission::new(context.project_key(), next_release);
        match policy {
            ClosePolicy::Preserve => {
                submission.state = context.state();
                submission.report = context.report().clone();
            }
            ClosePolicy::Reset => {
                submission.report = Report::from_files(context.submission_files());
            }
        }
        debug!(
            project = context.project_key(),
            release = next_release,
            ?policy,
            state = %submission.state,
            "submission carried into next release"
        );
        Ok(submission)
    }

    /// Clears the report and returns to `NOT_VALIDATED`. Accepted in every state.
    pub fn reset(&self, context: &mut dyn StateContext) -> Result<()> {
        self.check(context, Operation::Reset)?;
        *context.report_mut() = Report::default();
        self.transition(context, SubmissionState::NotValidated, Operation::Reset);
        Ok(())
    }
}
