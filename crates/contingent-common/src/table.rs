//! The 2×2 exposure × outcome contingency table.
//!
//! Cells are addressed as {exposed, unexposed} × {with_outcome, without_outcome}
//! and, in the classic epidemiological notation used by the stats crate:
//!
//! |              | outcome + | outcome − |
//! |--------------|-----------|-----------|
//! | exposure +   | a         | b         |
//! | exposure −   | c         | d         |
//!
//! The canonical ordered representation is `[a, b, c, d]`, i.e. the
//! (++, +−, −+, −−) order in which the four count queries are issued.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ContingentError, Result};

/// One of the four exposure × outcome combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    ExposedWithOutcome,
    ExposedWithoutOutcome,
    UnexposedWithOutcome,
    UnexposedWithoutOutcome,
}

impl Cell {
    /// All cells in the fixed (++, +−, −+, −−) order.
    pub const ALL: [Cell; 4] = [
        Cell::ExposedWithOutcome,
        Cell::ExposedWithoutOutcome,
        Cell::UnexposedWithOutcome,
        Cell::UnexposedWithoutOutcome,
    ];

    pub fn index(self) -> usize {
        match self {
            Cell::ExposedWithOutcome => 0,
            Cell::ExposedWithoutOutcome => 1,
            Cell::UnexposedWithOutcome => 2,
            Cell::UnexposedWithoutOutcome => 3,
        }
    }

    pub fn exposure_present(self) -> bool {
        matches!(self, Cell::ExposedWithOutcome | Cell::ExposedWithoutOutcome)
    }

    pub fn outcome_present(self) -> bool {
        matches!(self, Cell::ExposedWithOutcome | Cell::UnexposedWithOutcome)
    }

    /// Two-digit polarity code, exposure first: "11", "10", "01", "00".
    pub fn polarity(self) -> &'static str {
        match self {
            Cell::ExposedWithOutcome => "11",
            Cell::ExposedWithoutOutcome => "10",
            Cell::UnexposedWithOutcome => "01",
            Cell::UnexposedWithoutOutcome => "00",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cell::ExposedWithOutcome => "exposed_with_outcome",
            Cell::ExposedWithoutOutcome => "exposed_without_outcome",
            Cell::UnexposedWithOutcome => "unexposed_with_outcome",
            Cell::UnexposedWithoutOutcome => "unexposed_without_outcome",
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exposure row of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRow {
    pub with_outcome: u64,
    pub without_outcome: u64,
}

impl TableRow {
    pub fn total(&self) -> u64 {
        self.with_outcome + self.without_outcome
    }
}

/// Immutable 2×2 count table.
///
/// Serializes to the `{"exposed": {...}, "unexposed": {...}}` shape used by
/// downstream reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    exposed: TableRow,
    unexposed: TableRow,
}

impl ContingencyTable {
    pub fn new(a: u64, b: u64, c: u64, d: u64) -> Self {
        Self {
            exposed: TableRow { with_outcome: a, without_outcome: b },
            unexposed: TableRow { with_outcome: c, without_outcome: d },
        }
    }

    /// Build from counts in the fixed (++, +−, −+, −−) order.
    pub fn from_counts(counts: [u64; 4]) -> Self {
        let [a, b, c, d] = counts;
        Self::new(a, b, c, d)
    }

    /// Build from an ordered list of signed counts, as delivered by callers
    /// that have not validated their input yet.
    pub fn from_ordered(values: &[i64]) -> Result<Self> {
        if values.len() != 4 {
            return Err(ContingentError::InvalidTable(format!(
                "expected 4 ordered counts, got {}",
                values.len()
            )));
        }
        let mut counts = [0u64; 4];
        for (slot, (&v, cell)) in counts.iter_mut().zip(values.iter().zip(Cell::ALL)) {
            *slot = u64::try_from(v).map_err(|_| {
                ContingentError::InvalidTable(format!("{cell} count is negative: {v}"))
            })?;
        }
        Ok(Self::from_counts(counts))
    }

    /// Assemble from resolved `(cell, count)` pairs in any order.
    ///
    /// Every cell must be supplied exactly once; nothing is defaulted.
    pub fn from_cells<I>(cells: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Cell, u64)>,
    {
        let mut slots: [Option<u64>; 4] = [None; 4];
        for (cell, count) in cells {
            let slot = &mut slots[cell.index()];
            if slot.is_some() {
                return Err(ContingentError::InvalidTable(format!(
                    "{cell} resolved more than once"
                )));
            }
            *slot = Some(count);
        }

        let mut counts = [0u64; 4];
        for (cell, slot) in Cell::ALL.into_iter().zip(slots) {
            counts[cell.index()] = slot.ok_or_else(|| {
                ContingentError::InvalidTable(format!("missing count for {cell}"))
            })?;
        }
        Ok(Self::from_counts(counts))
    }

    pub fn to_ordered(&self) -> [u64; 4] {
        [self.a(), self.b(), self.c(), self.d()]
    }

    pub fn as_matrix(&self) -> [[u64; 2]; 2] {
        [
            [self.exposed.with_outcome, self.exposed.without_outcome],
            [self.unexposed.with_outcome, self.unexposed.without_outcome],
        ]
    }

    /// Exposed with outcome.
    pub fn a(&self) -> u64 { self.exposed.with_outcome }
    /// Exposed without outcome.
    pub fn b(&self) -> u64 { self.exposed.without_outcome }
    /// Unexposed with outcome.
    pub fn c(&self) -> u64 { self.unexposed.with_outcome }
    /// Unexposed without outcome.
    pub fn d(&self) -> u64 { self.unexposed.without_outcome }

    pub fn row_totals(&self) -> [u64; 2] {
        [self.exposed.total(), self.unexposed.total()]
    }

    pub fn column_totals(&self) -> [u64; 2] {
        [self.a() + self.c(), self.b() + self.d()]
    }

    pub fn total(&self) -> u64 {
        self.to_ordered().iter().sum()
    }

    /// Attach display labels without touching the counts.
    pub fn with_labels<'a>(&'a self, labels: &'a TableLabels) -> LabelledTable<'a> {
        LabelledTable { table: self, labels }
    }
}

/// Row/column captions used when rendering a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLabels {
    pub exposure: String,
    pub outcome: String,
}

impl Default for TableLabels {
    fn default() -> Self {
        Self {
            exposure: "Exposure".to_string(),
            outcome: "Outcome".to_string(),
        }
    }
}

/// Display adapter pairing a table with its labels.
pub struct LabelledTable<'a> {
    table: &'a ContingencyTable,
    labels: &'a TableLabels,
}

impl fmt::Display for LabelledTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.table;
        let with = format!("{} +", self.labels.outcome);
        let without = format!("{} -", self.labels.outcome);
        let exposed = format!("{} +", self.labels.exposure);
        let unexposed = format!("{} -", self.labels.exposure);
        let width = exposed.len().max(unexposed.len()).max("Total".len());
        let cols = [with.len(), without.len(), "Total".len()].map(|w| w.max(8));
        let [col_totals_with, col_totals_without] = t.column_totals();

        writeln!(f, "{:width$}  {:>w0$}  {:>w1$}  {:>w2$}", "", with, without, "Total",
            w0 = cols[0], w1 = cols[1], w2 = cols[2])?;
        writeln!(f, "{:width$}  {:>w0$}  {:>w1$}  {:>w2$}", exposed, t.a(), t.b(), t.exposed.total(),
            w0 = cols[0], w1 = cols[1], w2 = cols[2])?;
        writeln!(f, "{:width$}  {:>w0$}  {:>w1$}  {:>w2$}", unexposed, t.c(), t.d(), t.unexposed.total(),
            w0 = cols[0], w1 = cols[1], w2 = cols[2])?;
        write!(f, "{:width$}  {:>w0$}  {:>w1$}  {:>w2$}", "Total", col_totals_with, col_totals_without, t.total(),
            w0 = cols[0], w1 = cols[1], w2 = cols[2])
    }
}

impl fmt::Display for ContingencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_labels(&TableLabels::default()).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ordered_round_trip() {
        let table = ContingencyTable::from_ordered(&[30, 70, 10, 90]).unwrap();
        assert_eq!(table.to_ordered(), [30, 70, 10, 90]);
        assert_eq!(table.a(), 30);
        assert_eq!(table.d(), 90);
    }

    #[test]
    fn test_from_ordered_rejects_negative() {
        let err = ContingencyTable::from_ordered(&[1, -2, 3, 4]).unwrap_err();
        assert!(err.to_string().contains("exposed_without_outcome"));
    }

    #[test]
    fn test_from_ordered_rejects_wrong_length() {
        assert!(ContingencyTable::from_ordered(&[1, 2, 3]).is_err());
        assert!(ContingencyTable::from_ordered(&[1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_zero_cells_are_valid() {
        let table = ContingencyTable::from_ordered(&[0, 0, 0, 0]).unwrap();
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_from_cells_any_order() {
        let table = ContingencyTable::from_cells([
            (Cell::UnexposedWithoutOutcome, 4),
            (Cell::ExposedWithOutcome, 1),
            (Cell::UnexposedWithOutcome, 3),
            (Cell::ExposedWithoutOutcome, 2),
        ])
        .unwrap();
        assert_eq!(table.to_ordered(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_from_cells_missing_cell() {
        let err = ContingencyTable::from_cells([
            (Cell::ExposedWithOutcome, 1),
            (Cell::ExposedWithoutOutcome, 2),
            (Cell::UnexposedWithOutcome, 3),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("unexposed_without_outcome"));
    }

    #[test]
    fn test_from_cells_duplicate_cell() {
        let result = ContingencyTable::from_cells([
            (Cell::ExposedWithOutcome, 1),
            (Cell::ExposedWithOutcome, 1),
            (Cell::UnexposedWithOutcome, 3),
            (Cell::UnexposedWithoutOutcome, 4),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_totals() {
        let table = ContingencyTable::new(30, 70, 10, 90);
        assert_eq!(table.row_totals(), [100, 100]);
        assert_eq!(table.column_totals(), [40, 160]);
        assert_eq!(table.total(), 200);
        assert_eq!(table.as_matrix(), [[30, 70], [10, 90]]);
    }

    #[test]
    fn test_cell_polarity() {
        let codes: Vec<_> = Cell::ALL.iter().map(|c| c.polarity()).collect();
        assert_eq!(codes, vec!["11", "10", "01", "00"]);
        assert!(Cell::UnexposedWithOutcome.outcome_present());
        assert!(!Cell::UnexposedWithOutcome.exposure_present());
    }

    #[test]
    fn test_serializes_as_nested_rows() {
        let json = serde_json::to_value(ContingencyTable::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json["exposed"]["with_outcome"], 1);
        assert_eq!(json["unexposed"]["without_outcome"], 4);
    }

    #[test]
    fn test_labelled_display() {
        let labels = TableLabels { exposure: "Male".into(), outcome: "Ulcer".into() };
        let table = ContingencyTable::new(30, 70, 10, 90);
        let rendered = table.with_labels(&labels).to_string();
        assert!(rendered.contains("Male +"));
        assert!(rendered.contains("Ulcer -"));
        assert!(rendered.lines().last().unwrap().trim_end().ends_with("200"));
    }
}
