//! Cooperative stop signal shared between a scheduler and a running validation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Result, ValidateError};

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const ABORTED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A user asked for the validation to stop.
    Cancelled,
    /// The system stopped the validation (e.g. shutdown).
    Aborted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("cancelled"),
            StopReason::Aborted => f.write_str("aborted"),
        }
    }
}

/// Cloneable flag checked by validation workers between files.
///
/// The first stop request wins; later requests do not change the reason.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicU8>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.stop(CANCELLED);
    }

    pub fn abort(&self) {
        self.stop(ABORTED);
    }

    fn stop(&self, reason: u8) {
        let _ = self
            .0
            .compare_exchange(RUNNING, reason, Ordering::AcqRel, Ordering::Acquire);
    }

    pub fn reason(&self) -> Option<StopReason> {
        match self.0.load(Ordering::Acquire) {
            CANCELLED => Some(StopReason::Cancelled),
            ABORTED => Some(StopReason::Aborted),
            _ => None,
        }
    }

    /// Fails with `ValidateError::Stopped` once a stop was requested.
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(ValidateError::Stopped(reason)),
            None => Ok(()),
        }
    }
}
