use subval_model::{Report, Submission, SubmissionFile, SubmissionState};

/// Mutable view of one submission handed to state machine operations.
pub trait StateContext {
    fn project_key(&self) -> &str;
    fn state(&self) -> SubmissionState;
    fn set_state(&mut self, state: SubmissionState);
    fn report(&self) -> &Report;
    fn report_mut(&mut self) -> &mut Report;
    /// Current listing of the submission directory.
    fn submission_files(&self) -> &[SubmissionFile];
}

/// `StateContext` over an owned submission record and a file listing.
pub struct SubmissionContext<'a> {
    submission: &'a mut Submission,
    files: Vec<SubmissionFile>,
}

impl<'a> SubmissionContext<'a> {
    pub fn new(submission: &'a mut Submission, files: Vec<SubmissionFile>) -> Self {
        Self { submission, files }
    }
}

impl StateContext for SubmissionContext<'_> {
    fn project_key(&self) -> &str {
        &self.submission.project_key
    }

    fn state(&self) -> SubmissionState {
        self.submission.state
    }

    fn set_state(&mut self, state: SubmissionState) {
        self.submission.state = state;
        self.submission.touch();
    }

    fn report(&self) -> &Report {
        &self.submission.report
    }

    fn report_mut(&mut self) -> &mut Report {
        &mut self.submission.report
    }

    fn submission_files(&self) -> &[SubmissionFile] {
        &self.files
    }
}
