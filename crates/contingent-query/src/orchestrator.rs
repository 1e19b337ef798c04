//! Job orchestration: submit → poll → collect, for each of the four cells.
//!
//! The flow for one table build:
//!   1. Mint a fresh build id and formulate the four cell queries
//!   2. Submit each query as a counting job (tagged with its cell up front)
//!   3. Poll every job at a fixed interval until DONE or FAILED
//!   4. Fetch the count for each DONE job from the results endpoint
//!   5. Assemble the table once all four counts have resolved
//!
//! Cells run on up to `max_workers` concurrent lifecycles. The first error
//! aborts the build and drops any still-pending cell; no partial table is
//! ever returned.

use std::time::Duration;

use chrono::Utc;
use contingent_common::{Cell, ContingencyTable, PollingConfig};
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::client::TaskApi;
use crate::error::BuildError;
use crate::formulator::{CellQuery, ContingencyQuery};
use crate::job::{Job, JobStatus};
use crate::models::{JobResponse, QueryResult, StatusReport};

// ── Poll policy ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Give up with `BuildError::PollTimeout` after this many polls.
    Bounded { max_attempts: u32 },
    /// Poll until a terminal status. Interactive use only.
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub mode: PollMode,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;

    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, mode: PollMode::Bounded { max_attempts } }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self { interval, mode: PollMode::Unbounded }
    }

    pub fn from_config(cfg: &PollingConfig) -> Self {
        let interval = Duration::from_secs(cfg.interval_secs);
        if cfg.unbounded {
            Self::unbounded(interval)
        } else {
            Self::bounded(interval, cfg.max_attempts)
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::bounded(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

// ── Progress events ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Submitted,
    Polling,
    Done,
    Failed,
    Assembled,
}

/// Progress event emitted during a build (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct BuildProgress {
    pub build_id: String,
    /// `None` for whole-build events.
    pub cell: Option<Cell>,
    pub stage: BuildStage,
    pub job_uuid: Option<String>,
    pub attempt: u32,
    pub message: String,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct JobOrchestrator<A> {
    api: A,
    policy: PollPolicy,
    max_workers: usize,
    progress_tx: Option<broadcast::Sender<BuildProgress>>,
}

impl<A: TaskApi> JobOrchestrator<A> {
    pub const DEFAULT_MAX_WORKERS: usize = 4;

    pub fn new(api: A) -> Self {
        Self {
            api,
            policy: PollPolicy::default(),
            max_workers: Self::DEFAULT_MAX_WORKERS,
            progress_tx: None,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 1 runs the cells sequentially; values above 4 behave like 4.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_progress(mut self, tx: broadcast::Sender<BuildProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    fn emit(&self, build_id: &str, cell: Option<Cell>, stage: BuildStage, job: Option<&Job>, message: String) {
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.send(BuildProgress {
                build_id: build_id.to_string(),
                cell,
                stage,
                job_uuid: job.map(|j| j.job_uuid.clone()),
                attempt: job.map(|j| j.polls).unwrap_or(0),
                message,
            });
        }
    }

    /// Submit one cell's query; the returned job is SUBMITTED.
    #[instrument(skip(self, query), fields(cell = %query.cell, correlation_id = %query.correlation_id))]
    pub async fn submit(&self, query: &CellQuery) -> Result<Job, BuildError> {
        let value = self
            .api
            .submit_task(&query.submission)
            .await
            .map_err(|source| BuildError::Submission {
                cell: query.cell,
                correlation_id: query.correlation_id.clone(),
                source,
            })?;

        let resp = JobResponse::from_api_response(value).map_err(|e| BuildError::MalformedResponse {
            cell: query.cell,
            what: "job acknowledgement",
            reason: e.to_string(),
        })?;

        let job = Job {
            cell: query.cell,
            correlation_id: query.correlation_id.clone(),
            collection_id: query.collection_id.clone(),
            job_id: resp.job_id,
            job_uuid: resp.job_uuid,
            status: JobStatus::Submitted,
            remote_status: None,
            count: None,
            polls: 0,
            submitted_at: Utc::now(),
        };
        info!(job_uuid = %job.job_uuid, job_id = %job.job_id, "Job submitted");
        self.emit(&query.build_id, Some(job.cell), BuildStage::Submitted, Some(&job), resp.message.unwrap_or_default());
        Ok(job)
    }

    /// Ask the backend for the job's current status. Terminal jobs are
    /// returned unchanged without a request.
    pub async fn poll(&self, mut job: Job) -> Result<Job, BuildError> {
        if job.is_terminal() {
            return Ok(job);
        }

        let value = self
            .api
            .job_status(&job.job_uuid)
            .await
            .map_err(|source| BuildError::Transport {
                cell: job.cell,
                job_uuid: job.job_uuid.clone(),
                stage: "polling",
                source,
            })?;

        let report = StatusReport::from_api_response(&value).map_err(|reason| {
            BuildError::MalformedResponse { cell: job.cell, what: "status report", reason }
        })?;
        if report.job_uuid != job.job_uuid {
            return Err(BuildError::MalformedResponse {
                cell: job.cell,
                what: "status report",
                reason: format!("expected job {}, got a report for {}", job.job_uuid, report.job_uuid),
            });
        }

        job.polls += 1;
        job.status = JobStatus::from_remote(&report.status);
        debug!(cell = %job.cell, job_uuid = %job.job_uuid, attempt = job.polls, status = %report.status, "Polled job");
        job.remote_status = Some(report.status);
        Ok(job)
    }

    /// Fetch the resolved count for a DONE job.
    pub async fn fetch_count(&self, job: &Job) -> Result<u64, BuildError> {
        let value = self
            .api
            .job_results(&job.job_uuid, &job.collection_id)
            .await
            .map_err(|source| BuildError::Transport {
                cell: job.cell,
                job_uuid: job.job_uuid.clone(),
                stage: "fetching results for",
                source,
            })?;

        let result = QueryResult::from_api_response(value).map_err(|e| BuildError::MalformedResponse {
            cell: job.cell,
            what: "query result",
            reason: e.to_string(),
        })?;
        Ok(result.query_result.count)
    }

    /// Poll with the orchestrator's policy until the job resolves to a count.
    pub async fn await_completion(&self, job: Job) -> Result<u64, BuildError> {
        self.await_completion_with(job, self.policy, "").await
    }

    /// Poll with an explicit policy until the job resolves to a count.
    ///
    /// FAILED aborts immediately; a bounded policy aborts with
    /// `PollTimeout` once `max_attempts` polls have not reached a terminal
    /// status. The job is never resubmitted.
    #[instrument(skip(self, job, policy, build_id), fields(cell = %job.cell, job_uuid = %job.job_uuid))]
    pub async fn await_completion_with(
        &self,
        mut job: Job,
        policy: PollPolicy,
        build_id: &str,
    ) -> Result<u64, BuildError> {
        let mut attempts: u32 = 0;
        loop {
            job = self.poll(job).await?;
            attempts += 1;

            match job.status {
                JobStatus::Done => {
                    let count = self.fetch_count(&job).await?;
                    job.count = Some(count);
                    let elapsed = Utc::now() - job.submitted_at;
                    info!(count, attempts, elapsed_ms = elapsed.num_milliseconds(), "Job done");
                    self.emit(build_id, Some(job.cell), BuildStage::Done, Some(&job), format!("count = {count}"));
                    return Ok(count);
                }
                JobStatus::Failed => {
                    let status = job.remote_status.clone().unwrap_or_default();
                    warn!(%status, attempts, "Job failed");
                    self.emit(build_id, Some(job.cell), BuildStage::Failed, Some(&job), status.clone());
                    return Err(BuildError::JobFailed {
                        cell: job.cell,
                        job_uuid: job.job_uuid,
                        status,
                    });
                }
                JobStatus::Submitted | JobStatus::Running => {}
            }

            if let PollMode::Bounded { max_attempts } = policy.mode {
                if attempts >= max_attempts {
                    warn!(attempts, "Poll attempts exhausted");
                    return Err(BuildError::PollTimeout {
                        cell: job.cell,
                        job_uuid: job.job_uuid,
                        attempts,
                    });
                }
            }

            self.emit(
                build_id,
                Some(job.cell),
                BuildStage::Polling,
                Some(&job),
                job.remote_status.clone().unwrap_or_default(),
            );
            tokio::time::sleep(policy.interval).await;
        }
    }

    async fn run_cell(&self, query: &CellQuery) -> Result<(Cell, u64), BuildError> {
        let job = self.submit(query).await?;
        let count = self.await_completion_with(job, self.policy, &query.build_id).await?;
        Ok((query.cell, count))
    }

    /// Build the full 2×2 table for `query` against one collection.
    ///
    /// A fresh build id is minted on every call, so retrying a failed build
    /// never reuses a correlation id from an earlier attempt.
    #[instrument(skip(self, query), fields(exposure = %query.exposure_code, outcome = %query.outcome_code))]
    pub async fn build_contingency_table(
        &self,
        query: &ContingencyQuery,
        collection_id: &str,
        owner: &str,
    ) -> Result<ContingencyTable, BuildError> {
        let build_id = Uuid::new_v4().simple().to_string();
        info!(%build_id, %collection_id, "Starting contingency table build");
        let queries = query.build_queries(&build_id, collection_id, owner);
        self.build_from_queries(&queries).await
    }

    /// Drive pre-formulated cell queries to completion and assemble the table.
    pub async fn build_from_queries(&self, queries: &[CellQuery]) -> Result<ContingencyTable, BuildError> {
        let build_id = queries.first().map(|q| q.build_id.clone()).unwrap_or_default();

        let counts: Vec<(Cell, u64)> = stream::iter(queries.iter().map(|q| self.run_cell(q)))
            .buffer_unordered(self.max_workers)
            .try_collect()
            .await
            .inspect_err(|e| {
                warn!(%build_id, cell = ?e.cell(), error = %e, "Contingency table build aborted");
            })?;

        let table = ContingencyTable::from_cells(counts)?;
        info!(%build_id, counts = ?table.to_ordered(), total = table.total(), "Contingency table assembled");
        self.emit(&build_id, None, BuildStage::Assembled, None, format!("total = {}", table.total()));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_bounded() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.mode, PollMode::Bounded { max_attempts: 150 });
    }

    #[test]
    fn test_policy_from_config() {
        let mut cfg = PollingConfig::default();
        cfg.max_attempts = 3;
        assert_eq!(PollPolicy::from_config(&cfg).mode, PollMode::Bounded { max_attempts: 3 });
        cfg.unbounded = true;
        assert_eq!(PollPolicy::from_config(&cfg).mode, PollMode::Unbounded);
    }
}
