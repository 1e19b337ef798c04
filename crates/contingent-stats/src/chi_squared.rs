//! Pearson's chi-squared test of independence, optionally with Yates'
//! continuity correction, plus Cramér's V as the effect size.

use contingent_common::{ContingencyTable, StatsConfig};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::debug;

use crate::error::{check_unit_interval, Result, StatsError};
use crate::result::{format_p_value, TestSummary};
use crate::ContingencyTest;

/// Degrees of freedom of a 2×2 table.
const DEGREES_OF_FREEDOM: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChiSquaredResult {
    #[serde(flatten)]
    pub summary: TestSummary,
    pub statistic: f64,
    pub degrees_of_freedom: u32,
    pub cramers_v: f64,
    /// Expected counts under independence, `[[E(a), E(b)], [E(c), E(d)]]`.
    pub expected: [[f64; 2]; 2],
    pub yates_correction_applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquaredTest {
    alpha: f64,
    yates_correction: bool,
}

impl Default for ChiSquaredTest {
    fn default() -> Self {
        Self { alpha: 0.05, yates_correction: false }
    }
}

impl ChiSquaredTest {
    pub fn new(alpha: f64, yates_correction: bool) -> Result<Self> {
        Ok(Self { alpha: check_unit_interval("alpha", alpha)?, yates_correction })
    }

    pub fn from_config(cfg: &StatsConfig) -> Result<Self> {
        Self::new(cfg.alpha, cfg.yates_correction)
    }
}

impl ContingencyTest for ChiSquaredTest {
    type Output = ChiSquaredResult;

    fn name(&self) -> String {
        if self.yates_correction {
            "Chi-squared Test with Yates' correction".to_string()
        } else {
            "Chi-squared Test".to_string()
        }
    }

    fn calculate(&self, table: &ContingencyTable) -> Result<ChiSquaredResult> {
        let expected = expected_counts(table)?;
        let observed = table.as_matrix();

        let mut statistic = 0.0;
        for (obs_row, exp_row) in observed.iter().zip(expected.iter()) {
            for (&o, &e) in obs_row.iter().zip(exp_row.iter()) {
                let mut diff = (o as f64 - e).abs();
                if self.yates_correction {
                    diff -= diff.min(0.5);
                }
                statistic += diff * diff / e;
            }
        }

        let dist = ChiSquared::new(f64::from(DEGREES_OF_FREEDOM))
            .map_err(|e| StatsError::Distribution(e.to_string()))?;
        let p_value = dist.sf(statistic).clamp(0.0, 1.0);
        // min(rows, cols) - 1 = 1 for a 2×2 table
        let cramers_v = (statistic / table.total() as f64).sqrt();
        debug!(statistic, p_value, cramers_v, yates = self.yates_correction, "Chi-squared test");

        let interpretation = format!(
            "There is {}statistically significant association between exposure and outcome ({}). \
             Chi-squared statistic: {statistic:.2}, df={DEGREES_OF_FREEDOM}{}. Cramér's V: {cramers_v:.2}",
            if p_value < self.alpha { "a " } else { "no " },
            format_p_value(p_value),
            if self.yates_correction { " (with Yates' correction)" } else { "" },
        );

        Ok(ChiSquaredResult {
            summary: TestSummary::new(self.name(), p_value, self.alpha, observed, interpretation),
            statistic,
            degrees_of_freedom: DEGREES_OF_FREEDOM,
            cramers_v,
            expected,
            yates_correction_applied: self.yates_correction,
        })
    }
}

/// row_i · col_j / n for each cell. Fails if any margin is zero.
pub fn expected_counts(table: &ContingencyTable) -> Result<[[f64; 2]; 2]> {
    let rows = table.row_totals();
    let cols = table.column_totals();
    if rows.contains(&0) {
        return Err(StatsError::ZeroMargin { margin: "row" });
    }
    if cols.contains(&0) {
        return Err(StatsError::ZeroMargin { margin: "column" });
    }
    let n = table.total() as f64;
    Ok(rows.map(|r| cols.map(|c| r as f64 * c as f64 / n)))
}
