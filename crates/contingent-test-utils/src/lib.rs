//! contingent-test-utils: scripted task API backend for orchestrator tests.
//!
//! `FakeTaskApi` answers the three task endpoints from per-cell scripts: a
//! sequence of status strings (the last one repeats) and a result payload.
//! It records every call so tests can assert on submissions and poll counts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use contingent_common::Cell;
use contingent_query::formulator::cell_from_correlation_id;
use contingent_query::models::TaskSubmission;
use contingent_query::{TaskApi, TaskApiError};
use serde_json::{json, Value};

/// What the fake backend does for one cell.
#[derive(Debug, Clone)]
pub struct CellScript {
    statuses: Vec<String>,
    count: u64,
    result_override: Option<Value>,
    status_uuid: Option<String>,
    submit_error: Option<u16>,
}

impl CellScript {
    /// DONE on the first poll.
    pub fn done(count: u64) -> Self {
        Self::sequence(&["JOB_DONE"], count)
    }

    /// Report `statuses` on successive polls, repeating the last one.
    pub fn sequence(statuses: &[&str], count: u64) -> Self {
        Self {
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            count,
            result_override: None,
            status_uuid: None,
            submit_error: None,
        }
    }

    pub fn running_forever() -> Self {
        Self::sequence(&["JOB_RUNNING"], 0)
    }

    pub fn failed() -> Self {
        Self::sequence(&["JOB_FAILED"], 0)
    }

    /// Replace the results payload, e.g. with a malformed one.
    pub fn with_result(mut self, payload: Value) -> Self {
        self.result_override = Some(payload);
        self
    }

    /// Key status reports by `job_uuid` instead of the polled job's uuid.
    pub fn reporting_as(mut self, job_uuid: &str) -> Self {
        self.status_uuid = Some(job_uuid.to_string());
        self
    }

    /// Reject the submission with this HTTP status.
    pub fn submit_error(status: u16) -> Self {
        Self { submit_error: Some(status), ..Self::done(0) }
    }
}

#[derive(Default)]
struct FakeState {
    scripts: HashMap<Cell, CellScript>,
    jobs: HashMap<String, Cell>,
    submissions: Vec<TaskSubmission>,
    status_calls: HashMap<Cell, usize>,
    results_calls: HashMap<Cell, usize>,
}

/// Builder for creating configured fake task APIs.
#[derive(Default)]
pub struct FakeTaskApiBuilder {
    scripts: HashMap<Cell, CellScript>,
}

impl FakeTaskApiBuilder {
    pub fn cell(mut self, cell: Cell, script: CellScript) -> Self {
        self.scripts.insert(cell, script);
        self
    }

    /// Unscripted cells finish immediately with a count of zero.
    pub fn build(self) -> FakeTaskApi {
        let mut scripts = self.scripts;
        for cell in Cell::ALL {
            scripts.entry(cell).or_insert_with(|| CellScript::done(0));
        }
        FakeTaskApi {
            state: Mutex::new(FakeState { scripts, ..Default::default() }),
            next_job: AtomicU64::new(1),
        }
    }
}

pub struct FakeTaskApi {
    state: Mutex<FakeState>,
    next_job: AtomicU64,
}

impl FakeTaskApi {
    pub fn builder() -> FakeTaskApiBuilder {
        FakeTaskApiBuilder::default()
    }

    /// Every cell DONE on the first poll with the given (++, +−, −+, −−) counts.
    pub fn with_counts(counts: [u64; 4]) -> Self {
        Cell::ALL
            .into_iter()
            .zip(counts)
            .fold(Self::builder(), |b, (cell, n)| b.cell(cell, CellScript::done(n)))
            .build()
    }

    pub fn submissions(&self) -> Vec<TaskSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted_cells(&self) -> Vec<Cell> {
        self.submissions()
            .iter()
            .filter_map(|s| cell_from_correlation_id(&s.input.uuid))
            .collect()
    }

    pub fn status_calls(&self, cell: Cell) -> usize {
        self.state.lock().unwrap().status_calls.get(&cell).copied().unwrap_or(0)
    }

    pub fn total_status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls.values().sum()
    }

    pub fn results_calls(&self, cell: Cell) -> usize {
        self.state.lock().unwrap().results_calls.get(&cell).copied().unwrap_or(0)
    }

    fn cell_for_job(state: &FakeState, job_uuid: &str) -> Result<Cell, TaskApiError> {
        state.jobs.get(job_uuid).copied().ok_or_else(|| TaskApiError::Api {
            status: 404,
            body: format!("unknown job {job_uuid}"),
        })
    }
}

/// A well-formed results payload.
pub fn result_payload(job_uuid: &str, collection_id: &str, count: u64) -> Value {
    json!({
        "status": "ok",
        "protocolVersion": "v2",
        "uuid": job_uuid,
        "message": "",
        "collection_id": collection_id,
        "queryResult": {"count": count, "datasetsCount": 1, "files": []}
    })
}

#[async_trait]
impl TaskApi for FakeTaskApi {
    async fn submit_task(&self, submission: &TaskSubmission) -> Result<Value, TaskApiError> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(submission.clone());

        let cell = cell_from_correlation_id(&submission.input.uuid).ok_or_else(|| TaskApiError::Api {
            status: 400,
            body: format!("unrecognised correlation id {}", submission.input.uuid),
        })?;
        if let Some(status) = state.scripts[&cell].submit_error {
            return Err(TaskApiError::Api { status, body: "submission rejected".to_string() });
        }

        let n = self.next_job.fetch_add(1, Ordering::SeqCst);
        let job_uuid = format!("job-{}-{n}", cell.polarity());
        state.jobs.insert(job_uuid.clone(), cell);
        Ok(json!({"job-id": n.to_string(), "job-uuid": job_uuid, "message": "Job submitted"}))
    }

    async fn job_status(&self, job_uuid: &str) -> Result<Value, TaskApiError> {
        let mut state = self.state.lock().unwrap();
        let cell = Self::cell_for_job(&state, job_uuid)?;

        let calls = state.status_calls.entry(cell).or_insert(0);
        let idx = *calls;
        *calls += 1;

        let script = &state.scripts[&cell];
        let status = script
            .statuses
            .get(idx)
            .or_else(|| script.statuses.last())
            .cloned()
            .unwrap_or_else(|| "JOB_RUNNING".to_string());
        let reported = script.status_uuid.as_deref().unwrap_or(job_uuid);
        Ok(json!([{ reported: status }]))
    }

    async fn job_results(&self, job_uuid: &str, collection_id: &str) -> Result<Value, TaskApiError> {
        let mut state = self.state.lock().unwrap();
        let cell = Self::cell_for_job(&state, job_uuid)?;
        *state.results_calls.entry(cell).or_insert(0) += 1;

        let script = &state.scripts[&cell];
        Ok(script
            .result_override
            .clone()
            .unwrap_or_else(|| result_payload(job_uuid, collection_id, script.count)))
    }
}
