//! Wire models for the remote task API.
//!
//! Outbound: the availability query (cohort → groups → rules) wrapped in a
//! task submission. Inbound: job acknowledgement, status report and query
//! result payloads. Field order on the outbound types is the serialization
//! order, so identical inputs always produce identical bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task application name for count queries.
pub const AVAILABILITY_QUERY: &str = "AVAILABILITY_QUERY";

/// Status string the task API reports for a finished job.
pub const JOB_DONE: &str = "JOB_DONE";

// ── Outbound ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOperator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

/// A single coded-variable predicate. `varcat` names the domain table
/// (Condition, Drug, Person, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub varname: String,
    pub varcat: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub oper: RuleOperator,
    pub value: String,
}

impl Rule {
    /// OMOP concept rule: `= code` when present, `!= code` when absent.
    pub fn omop(code: &str, table: &str, present: bool) -> Self {
        Self {
            varname: "OMOP".to_string(),
            varcat: table.to_string(),
            value_type: "TEXT".to_string(),
            oper: if present { RuleOperator::Equals } else { RuleOperator::NotEquals },
            value: code.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub rules: Vec<Rule>,
    pub rules_operator: LogicalOperator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    pub groups: Vec<Group>,
    pub groups_operator: LogicalOperator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub cohort: Cohort,
    /// Client correlation id.
    pub uuid: String,
    pub owner: String,
    /// Always a list on the wire, even for a single collection.
    pub collection: Vec<String>,
    pub protocol_version: String,
    pub char_salt: String,
}

/// Body of `POST /task/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub application: String,
    pub input: AvailabilityQuery,
}

impl TaskSubmission {
    pub fn availability(input: AvailabilityQuery) -> Self {
        Self { application: AVAILABILITY_QUERY.to_string(), input }
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Acknowledgement returned by `POST /task/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    #[serde(rename = "job-id")]
    pub job_id: String,
    #[serde(rename = "job-uuid")]
    pub job_uuid: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobResponse {
    pub fn from_api_response(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// One entry of `GET /task/status/{job-uuid}`: `[{"<job-uuid>": "<status>"}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub job_uuid: String,
    pub status: String,
}

impl StatusReport {
    pub fn from_api_response(value: &Value) -> Result<Self, String> {
        let first = value
            .as_array()
            .ok_or_else(|| format!("expected a list, got {value}"))?
            .first()
            .ok_or_else(|| "status list is empty".to_string())?;
        let entry = first
            .as_object()
            .ok_or_else(|| format!("expected a mapping, got {first}"))?;
        let (job_uuid, status) = entry
            .iter()
            .next()
            .ok_or_else(|| "status mapping is empty".to_string())?;
        let status = status
            .as_str()
            .ok_or_else(|| format!("status for {job_uuid} is not a string: {status}"))?;

        Ok(Self { job_uuid: job_uuid.clone(), status: status.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResultData {
    pub count: u64,
    #[serde(rename = "datasetsCount", default)]
    pub datasets_count: u64,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Payload of `GET /task/results/{job-uuid}/{collection-id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub status: String,
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: String,
    pub uuid: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub collection_id: String,
    #[serde(rename = "queryResult")]
    pub query_result: QueryResultData,
}

impl QueryResult {
    pub fn from_api_response(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
