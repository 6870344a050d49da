//! Lifecycle states and validation outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    #[default]
    NotValidated,
    Queued,
    Validating,
    Valid,
    Invalid,
    Error,
    SignedOff,
}

impl SubmissionState {
    pub const ALL: [SubmissionState; 7] = [
        SubmissionState::NotValidated,
        SubmissionState::Queued,
        SubmissionState::Validating,
        SubmissionState::Valid,
        SubmissionState::Invalid,
        SubmissionState::Error,
        SubmissionState::SignedOff,
    ];

    /// Files and report are frozen while a validation is running.
    pub fn is_read_only(self) -> bool {
        self == SubmissionState::Validating
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionState::NotValidated => "NOT_VALIDATED",
            SubmissionState::Queued => "QUEUED",
            SubmissionState::Validating => "VALIDATING",
            SubmissionState::Valid => "VALID",
            SubmissionState::Invalid => "INVALID",
            SubmissionState::Error => "ERROR",
            SubmissionState::SignedOff => "SIGNED_OFF",
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a validation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Stopped by the system (e.g. shutdown).
    Aborted,
    /// Stopped at a user's request.
    Cancelled,
    Completed,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Aborted => "ABORTED",
            Outcome::Cancelled => "CANCELLED",
            Outcome::Completed => "COMPLETED",
            Outcome::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Validation state of a report node (data type, file type or file).
///
/// Variants are declared in aggregation precedence order: a parent takes the
/// state of its highest-precedence child.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportState {
    Error,
    Invalid,
    Validating,
    Queued,
    #[default]
    NotValidated,
    Valid,
}

pub type DataTypeState = ReportState;
pub type FileTypeState = ReportState;
pub type FileState = ReportState;

impl ReportState {
    /// Combines child states into the parent state.
    ///
    /// An empty set of children is `NotValidated`.
    pub fn aggregate<I>(states: I) -> ReportState
    where
        I: IntoIterator<Item = ReportState>,
    {
        states.into_iter().min().unwrap_or_default()
    }
}
