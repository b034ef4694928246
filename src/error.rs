use std::path::PathBuf;

use thiserror::Error;

use crate::types::MeasurementStatus;

/// Data capturing error types
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Measurement {0} not found")]
    NotFound(u64),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: MeasurementStatus,
        to: MeasurementStatus,
    },

    #[error("Malformed event log: {0}")]
    MalformedEventLog(String),

    /// The device-wide OPEN/PAUSED invariant no longer holds.
    #[error("Corrupted measurement state: {0}")]
    CorruptedState(String),

    #[error("Sample file missing: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Unsupported format version {found} (supported: {supported})")]
    FormatVersionMismatch { found: u16, supported: u16 },

    #[error("Truncated data: {0}")]
    Truncated(String),

    #[error("Malformed transfer message: {0}")]
    MalformedMessage(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for capturing operations
pub type CResult<T> = Result<T, CaptureError>;

impl CaptureError {
    /// Whether this error signals a programming or data corruption problem
    /// rather than a condition the caller can expect.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            CaptureError::InvalidTransition { .. }
                | CaptureError::MalformedEventLog(_)
                | CaptureError::CorruptedState(_)
        )
    }
}
