//! Analysis report: table, ratio measures and test outcomes.

use std::fmt::Write as _;

use contingent_common::{ContingencyTable, TableLabels};
use contingent_stats::{ContingencyTest, RatioSummary, StatOutcome, StatTest};
use serde::Serialize;
use tracing::warn;

/// A test that could not be run on this table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTest {
    pub test: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub table: ContingencyTable,
    pub ratios: RatioSummary,
    pub tests: Vec<StatOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedTest>,
}

impl Report {
    /// Run every test in `suite`; a test rejecting the table is recorded, not fatal.
    pub fn analyze(table: ContingencyTable, suite: &[StatTest]) -> Self {
        let mut tests = Vec::with_capacity(suite.len());
        let mut skipped = Vec::new();
        for test in suite {
            match test.calculate(&table) {
                Ok(outcome) => tests.push(outcome),
                Err(e) => {
                    warn!(test = %test.name(), error = %e, "Test skipped");
                    skipped.push(SkippedTest { test: test.name(), reason: e.to_string() });
                }
            }
        }
        Self { ratios: RatioSummary::from_table(&table), table, tests, skipped }
    }

    pub fn render(&self, labels: &TableLabels) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}\n", self.table.with_labels(labels));
        let _ = writeln!(out, "{}", self.ratios);
        for outcome in &self.tests {
            let summary = outcome.summary();
            let _ = writeln!(out, "\n{}", summary.test_name);
            let _ = writeln!(out, "  {}", summary.interpretation);
        }
        for skipped in &self.skipped {
            let _ = writeln!(out, "\n{}: not computed ({})", skipped.test, skipped.reason);
        }
        out
    }
}
