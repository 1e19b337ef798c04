//! Fisher's exact test on a 2×2 table.
//!
//! The p-value is exact under the hypergeometric distribution of `a` given
//! the table margins. The odds-ratio interval is the Woolf (log-scale)
//! interval, rounded to three decimals.

use std::fmt;
use std::str::FromStr;

use contingent_common::{ContingencyTable, StatsConfig};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::factorial::ln_factorial;
use tracing::debug;

use crate::error::{check_unit_interval, Result, StatsError};
use crate::result::{format_p_value, format_percent, TestSummary};
use crate::ContingencyTest;

/// Relative tolerance when collecting tables "at least as extreme" as the observed one.
const TWO_SIDED_TOLERANCE: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    #[default]
    TwoSided,
    /// Odds ratio > 1.
    Greater,
    /// Odds ratio < 1.
    Less,
}

impl Alternative {
    pub fn as_str(self) -> &'static str {
        match self {
            Alternative::TwoSided => "two-sided",
            Alternative::Greater => "greater",
            Alternative::Less => "less",
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alternative {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-sided" | "two_sided" => Ok(Alternative::TwoSided),
            "greater" => Ok(Alternative::Greater),
            "less" => Ok(Alternative::Less),
            _ => Err(StatsError::UnknownAlternative(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FisherResult {
    #[serde(flatten)]
    pub summary: TestSummary,
    /// Sample odds ratio; `+inf` when b·c = 0.
    pub odds_ratio: f64,
    /// `(NaN, +inf)` when the odds ratio is infinite, `(NaN, NaN)` when any cell is zero.
    pub confidence_interval: (f64, f64),
    pub confidence_level: f64,
    pub alternative: Alternative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FisherExactTest {
    alpha: f64,
    confidence_level: f64,
    alternative: Alternative,
}

impl Default for FisherExactTest {
    fn default() -> Self {
        Self { alpha: 0.05, confidence_level: 0.95, alternative: Alternative::TwoSided }
    }
}

impl FisherExactTest {
    pub fn new(alpha: f64, confidence_level: f64, alternative: Alternative) -> Result<Self> {
        Ok(Self {
            alpha: check_unit_interval("alpha", alpha)?,
            confidence_level: check_unit_interval("confidence_level", confidence_level)?,
            alternative,
        })
    }

    pub fn from_config(cfg: &StatsConfig) -> Result<Self> {
        Self::new(cfg.alpha, cfg.confidence_level, cfg.alternative.parse()?)
    }

    pub fn alternative(&self) -> Alternative {
        self.alternative
    }

    fn interpretation(&self, p: f64, odds_ratio: f64, ci: (f64, f64)) -> String {
        let article = if p < self.alpha { "a" } else { "no" };
        match self.alternative {
            Alternative::TwoSided => {
                format!(
                    "There is {article} statistically significant association between exposure and outcome \
                     ({}). Odds ratio: {odds_ratio:.2} ({}% CI: {} to {})",
                    format_p_value(p),
                    format_percent(self.confidence_level),
                    format_bound(ci.0),
                    format_bound(ci.1),
                )
            }
            Alternative::Greater => format!(
                "There is {article} statistically significant positive association (odds ratio > 1) \
                 between exposure and outcome ({}).",
                format_p_value(p)
            ),
            Alternative::Less => format!(
                "There is {article} statistically significant negative association (odds ratio < 1) \
                 between exposure and outcome ({}).",
                format_p_value(p)
            ),
        }
    }
}

fn format_bound(bound: f64) -> String {
    if bound.is_nan() {
        "undefined".to_string()
    } else if bound.is_infinite() {
        "infinity".to_string()
    } else {
        format!("{bound:.2}")
    }
}

impl ContingencyTest for FisherExactTest {
    type Output = FisherResult;

    fn name(&self) -> String {
        format!("Fisher's Exact Test ({})", self.alternative)
    }

    fn calculate(&self, table: &ContingencyTable) -> Result<FisherResult> {
        let p_value = fisher_p_value(table, self.alternative);
        let odds_ratio = sample_odds_ratio(table);
        let confidence_interval = odds_ratio_interval(table, odds_ratio, self.confidence_level)?;
        debug!(p_value, odds_ratio, ?confidence_interval, alternative = %self.alternative, "Fisher's exact test");

        let interpretation = self.interpretation(p_value, odds_ratio, confidence_interval);
        Ok(FisherResult {
            summary: TestSummary::new(self.name(), p_value, self.alpha, table.as_matrix(), interpretation),
            odds_ratio,
            confidence_interval,
            confidence_level: self.confidence_level,
            alternative: self.alternative,
        })
    }
}

/// (a·d)/(b·c), or `+inf` when b·c = 0.
fn sample_odds_ratio(table: &ContingencyTable) -> f64 {
    let bc = table.b() as f64 * table.c() as f64;
    if bc == 0.0 {
        f64::INFINITY
    } else {
        (table.a() as f64 * table.d() as f64) / bc
    }
}

fn odds_ratio_interval(table: &ContingencyTable, odds_ratio: f64, level: f64) -> Result<(f64, f64)> {
    if odds_ratio.is_infinite() {
        return Ok((f64::NAN, f64::INFINITY));
    }
    let cells = table.to_ordered();
    let se = if cells.contains(&0) {
        f64::NAN
    } else {
        cells.iter().map(|&n| 1.0 / n as f64).sum::<f64>().sqrt()
    };
    let normal = Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))?;
    let z = normal.inverse_cdf(1.0 - (1.0 - level) / 2.0);
    let log_or = odds_ratio.ln();
    Ok((round3((log_or - z * se).exp()), round3((log_or + z * se).exp())))
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Exact p-value for the observed `a` under the hypergeometric null.
///
/// A table with an empty row or column has p = 1.
pub fn fisher_p_value(table: &ContingencyTable, alternative: Alternative) -> f64 {
    let [row1, row2] = table.row_totals();
    let [col1, _] = table.column_totals();
    if row1 == 0 || row2 == 0 || col1 == 0 || col1 == table.total() {
        return 1.0;
    }

    let hyper = Hypergeometric::new(row1, row2, col1);
    let observed = table.a();
    let p: f64 = match alternative {
        Alternative::Greater => hyper.support().filter(|&x| x >= observed).map(|x| hyper.pmf(x)).sum(),
        Alternative::Less => hyper.support().filter(|&x| x <= observed).map(|x| hyper.pmf(x)).sum(),
        Alternative::TwoSided => {
            let threshold = hyper.pmf(observed) * (1.0 + TWO_SIDED_TOLERANCE);
            hyper
                .support()
                .map(|x| hyper.pmf(x))
                .filter(|&p| p <= threshold)
                .sum::<f64>()
        }
    };
    p.clamp(0.0, 1.0)
}

/// Distribution of the top-left cell given row totals and the first column total.
struct Hypergeometric {
    row1: u64,
    row2: u64,
    col1: u64,
    ln_denominator: f64,
}

impl Hypergeometric {
    fn new(row1: u64, row2: u64, col1: u64) -> Self {
        Self { row1, row2, col1, ln_denominator: ln_choose(row1 + row2, col1) }
    }

    fn support(&self) -> impl Iterator<Item = u64> {
        self.col1.saturating_sub(self.row2)..=self.row1.min(self.col1)
    }

    fn pmf(&self, x: u64) -> f64 {
        (ln_choose(self.row1, x) + ln_choose(self.row2, self.col1 - x) - self.ln_denominator).exp()
    }
}

fn ln_choose(n: u64, k: u64) -> f64 {
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}
