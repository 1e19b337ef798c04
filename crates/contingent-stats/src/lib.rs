//! contingent-stats: Association measures and significance tests for 2×2 tables.
//!
//! Everything here is a pure function of a borrowed `ContingencyTable`.
//! Ratio measures return an explicit `Measure::Undefined` instead of failing;
//! significance tests share the `ContingencyTest` interface and are
//! dispatched through `StatTest` when the set of tests is chosen at runtime.

pub mod chi_squared;
pub mod error;
pub mod fisher;
pub mod ratios;
pub mod result;

use contingent_common::{ContingencyTable, StatsConfig};
use serde::Serialize;

pub use chi_squared::{ChiSquaredResult, ChiSquaredTest};
pub use error::StatsError;
pub use fisher::{Alternative, FisherExactTest, FisherResult};
pub use ratios::{odds_ratio, risk_difference, risk_ratio, Measure, RatioSummary};
pub use result::{format_p_value, TestSummary};

/// A significance test over a 2×2 table.
pub trait ContingencyTest {
    type Output;

    /// Display name, including any mode suffix.
    fn name(&self) -> String;

    fn calculate(&self, table: &ContingencyTable) -> error::Result<Self::Output>;
}

/// The available tests, for runtime selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatTest {
    Fisher(FisherExactTest),
    ChiSquared(ChiSquaredTest),
}

/// Result of a `StatTest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum StatOutcome {
    Fisher(FisherResult),
    ChiSquared(ChiSquaredResult),
}

impl StatOutcome {
    pub fn summary(&self) -> &TestSummary {
        match self {
            StatOutcome::Fisher(r) => &r.summary,
            StatOutcome::ChiSquared(r) => &r.summary,
        }
    }
}

impl StatTest {
    /// Fisher's exact test and the chi-squared test, configured from `cfg`.
    pub fn standard_suite(cfg: &StatsConfig) -> error::Result<Vec<StatTest>> {
        Ok(vec![
            StatTest::Fisher(FisherExactTest::from_config(cfg)?),
            StatTest::ChiSquared(ChiSquaredTest::from_config(cfg)?),
        ])
    }
}

impl From<FisherExactTest> for StatTest {
    fn from(test: FisherExactTest) -> Self {
        StatTest::Fisher(test)
    }
}

impl From<ChiSquaredTest> for StatTest {
    fn from(test: ChiSquaredTest) -> Self {
        StatTest::ChiSquared(test)
    }
}

impl ContingencyTest for StatTest {
    type Output = StatOutcome;

    fn name(&self) -> String {
        match self {
            StatTest::Fisher(t) => t.name(),
            StatTest::ChiSquared(t) => t.name(),
        }
    }

    fn calculate(&self, table: &ContingencyTable) -> error::Result<StatOutcome> {
        Ok(match self {
            StatTest::Fisher(t) => StatOutcome::Fisher(t.calculate(table)?),
            StatTest::ChiSquared(t) => StatOutcome::ChiSquared(t.calculate(table)?),
        })
    }
}
