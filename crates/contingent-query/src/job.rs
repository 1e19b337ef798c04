//! Client-side view of one remote counting job.

use chrono::{DateTime, Utc};
use contingent_common::Cell;
use serde::{Deserialize, Serialize};

use crate::models::JOB_DONE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    /// Map a task API status string onto the client lifecycle.
    ///
    /// `JOB_DONE` is the only success status. Anything naming a failure,
    /// error or cancellation is terminal; queue-style statuses count as
    /// submitted and everything else as running.
    pub fn from_remote(status: &str) -> Self {
        let s = status.trim().to_ascii_uppercase();
        if s == JOB_DONE {
            JobStatus::Done
        } else if ["FAIL", "ERROR", "CANCEL", "ABORT"].iter().any(|k| s.contains(k)) {
            JobStatus::Failed
        } else if ["SUBMITTED", "QUEUED", "PENDING", "WAITING"].iter().any(|k| s.contains(k)) {
            JobStatus::Submitted
        } else {
            JobStatus::Running
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub cell: Cell,
    pub correlation_id: String,
    pub collection_id: String,
    pub job_id: String,
    pub job_uuid: String,
    pub status: JobStatus,
    /// Last raw status string reported by the backend.
    pub remote_status: Option<String>,
    /// Set once the job is DONE and its result has been fetched.
    pub count: Option<u64>,
    pub polls: u32,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
