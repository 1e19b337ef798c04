//! Ratio measures of association.
//!
//! Cells are read as a = exposed∧outcome, b = exposed∧¬outcome,
//! c = ¬exposed∧outcome, d = ¬exposed∧¬outcome. A zero denominator yields
//! `Measure::Undefined` rather than an error.

use std::fmt;

use contingent_common::ContingencyTable;
use serde::Serialize;

/// A ratio that may be undefined for the given table.
///
/// Serializes as a number, or `null` when undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Measure {
    Value(f64),
    Undefined,
}

impl Measure {
    pub fn value(self) -> Option<f64> {
        match self {
            Measure::Value(v) => Some(v),
            Measure::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Measure::Undefined)
    }
}

impl From<Option<f64>> for Measure {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Measure::Undefined, Measure::Value)
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Value(v) => write!(f, "{v:.3}"),
            Measure::Undefined => f.write_str("undefined"),
        }
    }
}

/// (a·d)/(b·c). Undefined when b·c = 0.
pub fn odds_ratio(table: &ContingencyTable) -> Measure {
    let (a, b, c, d) = cells(table);
    if b * c == 0.0 {
        return Measure::Undefined;
    }
    Measure::Value((a * d) / (b * c))
}

/// Risk among the exposed over risk among the unexposed.
/// Undefined when either row is empty or c = 0.
pub fn risk_ratio(table: &ContingencyTable) -> Measure {
    let (_, _, c, _) = cells(table);
    match risks(table) {
        Some((exposed, unexposed)) if c > 0.0 => Measure::Value(exposed / unexposed),
        _ => Measure::Undefined,
    }
}

/// Risk among the exposed minus risk among the unexposed.
/// Undefined when either row is empty.
pub fn risk_difference(table: &ContingencyTable) -> Measure {
    risks(table)
        .map(|(exposed, unexposed)| exposed - unexposed)
        .into()
}

fn cells(table: &ContingencyTable) -> (f64, f64, f64, f64) {
    (table.a() as f64, table.b() as f64, table.c() as f64, table.d() as f64)
}

/// (risk_exposed, risk_unexposed), or `None` if either row total is zero.
fn risks(table: &ContingencyTable) -> Option<(f64, f64)> {
    let [exposed_total, unexposed_total] = table.row_totals();
    if exposed_total == 0 || unexposed_total == 0 {
        return None;
    }
    Some((
        table.a() as f64 / exposed_total as f64,
        table.c() as f64 / unexposed_total as f64,
    ))
}

/// Headline figures reported alongside a built table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioSummary {
    pub total: u64,
    pub odds_ratio: Measure,
    pub risk_ratio: Measure,
    pub risk_difference: Measure,
}

impl RatioSummary {
    pub fn from_table(table: &ContingencyTable) -> Self {
        Self {
            total: table.total(),
            odds_ratio: odds_ratio(table),
            risk_ratio: risk_ratio(table),
            risk_difference: risk_difference(table),
        }
    }
}

impl fmt::Display for RatioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total patients:  {}", self.total)?;
        writeln!(f, "Odds ratio:      {}", self.odds_ratio)?;
        writeln!(f, "Risk ratio:      {}", self.risk_ratio)?;
        write!(f, "Risk difference: {}", self.risk_difference)
    }
}
