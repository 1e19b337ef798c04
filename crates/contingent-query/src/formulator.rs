//! Query formulation: exposure/outcome pair → four cohort queries.
//!
//! Each cell of the table is one cohort: an AND of an exposure predicate and
//! an outcome predicate, wrapped in a single-group OR disjunction (the remote
//! protocol always expects a disjunction of groups). Pure functions, no I/O.

use contingent_common::{Cell, QueryConfig};
use serde::{Deserialize, Serialize};

use crate::models::{AvailabilityQuery, Cohort, Group, LogicalOperator, Rule, TaskSubmission};

pub const CORRELATION_PREFIX: &str = "contingency";

/// The exposure/outcome pair a table is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyQuery {
    pub exposure_code: String,
    pub exposure_table: String,
    pub outcome_code: String,
    pub outcome_table: String,
    pub protocol_version: String,
    pub char_salt: String,
}

/// A cell's cohort, before it is wrapped into a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellCohort {
    pub cell: Cell,
    pub cohort: Cohort,
}

/// A ready-to-submit query for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellQuery {
    pub cell: Cell,
    pub build_id: String,
    pub correlation_id: String,
    pub collection_id: String,
    pub submission: TaskSubmission,
}

impl CellQuery {
    /// Serialized request body.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.submission)
    }
}

impl ContingencyQuery {
    pub fn new(
        exposure_code: impl Into<String>,
        exposure_table: impl Into<String>,
        outcome_code: impl Into<String>,
        outcome_table: impl Into<String>,
    ) -> Self {
        Self {
            exposure_code: exposure_code.into(),
            exposure_table: exposure_table.into(),
            outcome_code: outcome_code.into(),
            outcome_table: outcome_table.into(),
            protocol_version: "v2".to_string(),
            char_salt: "salt".to_string(),
        }
    }

    pub fn from_config(cfg: &QueryConfig) -> Self {
        Self {
            exposure_code: cfg.exposure_code.clone(),
            exposure_table: cfg.exposure_table.clone(),
            outcome_code: cfg.outcome_code.clone(),
            outcome_table: cfg.outcome_table.clone(),
            protocol_version: cfg.protocol_version.clone(),
            char_salt: cfg.char_salt.clone(),
        }
    }

    /// Four cohorts in the fixed (++, +−, −+, −−) order.
    pub fn build_cohorts(&self) -> [CellCohort; 4] {
        build_cohorts(
            &self.exposure_code,
            &self.exposure_table,
            &self.outcome_code,
            &self.outcome_table,
        )
    }

    /// Four submission payloads, one per cell, tagged with correlation ids
    /// derived from `build_id`. Use a fresh `build_id` per build attempt.
    pub fn build_queries(&self, build_id: &str, collection_id: &str, owner: &str) -> [CellQuery; 4] {
        self.build_cohorts().map(|CellCohort { cell, cohort }| {
            let correlation_id = correlation_id(build_id, cell);
            let input = AvailabilityQuery {
                cohort,
                uuid: correlation_id.clone(),
                owner: owner.to_string(),
                collection: vec![collection_id.to_string()],
                protocol_version: self.protocol_version.clone(),
                char_salt: self.char_salt.clone(),
            };
            CellQuery {
                cell,
                build_id: build_id.to_string(),
                correlation_id,
                collection_id: collection_id.to_string(),
                submission: TaskSubmission::availability(input),
            }
        })
    }
}

/// Build the four cell cohorts for an exposure/outcome pair.
pub fn build_cohorts(
    exposure_code: &str,
    exposure_table: &str,
    outcome_code: &str,
    outcome_table: &str,
) -> [CellCohort; 4] {
    Cell::ALL.map(|cell| CellCohort {
        cell,
        cohort: build_cohort(cell, exposure_code, exposure_table, outcome_code, outcome_table),
    })
}

pub fn build_cohort(
    cell: Cell,
    exposure_code: &str,
    exposure_table: &str,
    outcome_code: &str,
    outcome_table: &str,
) -> Cohort {
    let rules = vec![
        Rule::omop(exposure_code, exposure_table, cell.exposure_present()),
        Rule::omop(outcome_code, outcome_table, cell.outcome_present()),
    ];
    Cohort {
        groups: vec![Group { rules, rules_operator: LogicalOperator::And }],
        groups_operator: LogicalOperator::Or,
    }
}

/// `contingency_{build_id}_{cell index}_{polarity}`.
pub fn correlation_id(build_id: &str, cell: Cell) -> String {
    format!("{CORRELATION_PREFIX}_{build_id}_{}_{}", cell.index(), cell.polarity())
}

/// Recover the cell a correlation id was minted for.
pub fn cell_from_correlation_id(id: &str) -> Option<Cell> {
    let mut parts = id.rsplitn(3, '_');
    let polarity = parts.next()?;
    let index: usize = parts.next()?.parse().ok()?;
    Cell::ALL
        .into_iter()
        .find(|c| c.index() == index && c.polarity() == polarity)
}
