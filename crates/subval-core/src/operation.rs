//! Lookup table of the operations each submission state accepts.

use std::fmt;

use subval_model::SubmissionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ModifyFile,
    QueueRequest,
    StartValidation,
    CancelValidation,
    FinishValidation,
    SignOff,
    CloseRelease,
    Reset,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::ModifyFile => "modifyFile",
            Operation::QueueRequest => "queueRequest",
            Operation::StartValidation => "startValidation",
            Operation::CancelValidation => "cancelValidation",
            Operation::FinishValidation => "finishValidation",
            Operation::SignOff => "signOff",
            Operation::CloseRelease => "closeRelease",
            Operation::Reset => "reset",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations accepted by `state`.
pub fn allowed_operations(state: SubmissionState) -> &'static [Operation] {
    use Operation::{
        CancelValidation, CloseRelease, FinishValidation, ModifyFile, QueueRequest, Reset,
        SignOff, StartValidation,
    };

    match state {
        SubmissionState::NotValidated | SubmissionState::Invalid => {
            &[ModifyFile, QueueRequest, CloseRelease, Reset]
        }
        SubmissionState::Queued => &[
            ModifyFile,
            StartValidation,
            CancelValidation,
            CloseRelease,
            Reset,
        ],
        SubmissionState::Validating => &[CancelValidation, FinishValidation, CloseRelease, Reset],
        SubmissionState::Valid => &[ModifyFile, QueueRequest, SignOff, CloseRelease, Reset],
        SubmissionState::Error | SubmissionState::SignedOff => &[ModifyFile, CloseRelease, Reset],
    }
}

pub fn is_allowed(state: SubmissionState, operation: Operation) -> bool {
    allowed_operations(state).contains(&operation)
}
