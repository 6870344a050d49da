use thiserror::Error;

use subval_model::SubmissionState;

use crate::operation::Operation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("operation {operation} is not allowed in state {state}")]
    InvalidStateOperation {
        state: SubmissionState,
        operation: Operation,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;
