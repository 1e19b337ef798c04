use contingent_common::{Cell, ContingentError};
use thiserror::Error;

/// Transport-level failure talking to the task API.
#[derive(Debug, Error)]
pub enum TaskApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error [{status}]: {body}")]
    Api { status: u16, body: String },
}

/// Why a contingency table build was aborted.
///
/// Every variant except `Table` names the cell whose query caused the abort.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("submission failed for {cell} ({correlation_id}): {source}")]
    Submission {
        cell: Cell,
        correlation_id: String,
        source: TaskApiError,
    },

    #[error("transport error while {stage} job {job_uuid} for {cell}: {source}")]
    Transport {
        cell: Cell,
        job_uuid: String,
        stage: &'static str,
        source: TaskApiError,
    },

    #[error("job {job_uuid} for {cell} failed with status {status}")]
    JobFailed {
        cell: Cell,
        job_uuid: String,
        status: String,
    },

    #[error("job {job_uuid} for {cell} did not finish after {attempts} polls")]
    PollTimeout {
        cell: Cell,
        job_uuid: String,
        attempts: u32,
    },

    #[error("malformed {what} for {cell}: {reason}")]
    MalformedResponse {
        cell: Cell,
        what: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Table(#[from] ContingentError),
}

impl BuildError {
    /// The cell whose query produced this error, if any.
    pub fn cell(&self) -> Option<Cell> {
        match self {
            BuildError::Submission { cell, .. }
            | BuildError::Transport { cell, .. }
            | BuildError::JobFailed { cell, .. }
            | BuildError::PollTimeout { cell, .. }
            | BuildError::MalformedResponse { cell, .. } => Some(*cell),
            BuildError::Table(_) => None,
        }
    }

    /// Submission errors may be retried with the same payload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BuildError::Submission { .. })
    }
}
