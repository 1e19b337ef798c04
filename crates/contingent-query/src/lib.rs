//! contingent-query: Cohort query formulation and job orchestration.
//!
//! Turns an exposure/outcome pair into four availability queries, submits
//! them as counting jobs to the remote task API, polls each job to a terminal
//! status and assembles the resolved counts into a `ContingencyTable`.

pub mod client;
pub mod error;
pub mod formulator;
pub mod job;
pub mod models;
pub mod orchestrator;

pub use client::{TaskApi, TaskApiClient};
pub use error::{BuildError, TaskApiError};
pub use formulator::{CellQuery, ContingencyQuery};
pub use job::{Job, JobStatus};
pub use orchestrator::{BuildProgress, BuildStage, JobOrchestrator, PollMode, PollPolicy};
