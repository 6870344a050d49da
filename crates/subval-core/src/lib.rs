//! Submission lifecycle state machine.

pub mod context;
pub mod error;
pub mod machine;
pub mod operation;

pub use context::{StateContext, SubmissionContext};
pub use error::{Result, StateError};
pub use machine::{ClosePolicy, FileEvent, SubmissionStateMachine, next_state};
pub use operation::{Operation, allowed_operations, is_allowed};
