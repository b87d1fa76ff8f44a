//! Labeled tables and series with explicit missing cells.
//!
//! Progress PDFs leave cells blank for weeks that have not happened yet, so
//! every cell is a [`Cell`]: either a present [`Value`] or `Missing`. The
//! zero-substitution used by the weekly mean is therefore written out where
//! it happens (see [`crate::report::AssignmentSeries::mean_units_per_week`])
//! instead of hiding inside a numeric sentinel.
//!
//! [`Series`] and [`Table`] are backed by [`IndexMap`] so label order is the
//! order the source document used. Every reshaping operation (`transpose`,
//! `drop_row`, `rename_columns`, `stack`) borrows `self` and returns a new
//! value; assembly steps can be tested one at a time.

use crate::error::ReportError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A present cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

/// One table cell. Serialises as the bare value, or `null` when missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Present(Value),
    #[default]
    Missing,
}

impl Cell {
    /// A numeric cell. NaN and infinities are not values; they become `Missing`.
    pub fn number(v: f64) -> Self {
        if v.is_finite() {
            Cell::Present(Value::Number(v))
        } else {
            Cell::Missing
        }
    }

    pub fn text(v: impl Into<String>) -> Self {
        Cell::Present(Value::Text(v.into()))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// The numeric value, if the cell holds a finite one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Present(Value::Number(v)) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::number(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::text(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Missing, Into::into)
    }
}

/// Display text. `Missing` and non-finite numbers are the empty string,
/// whole numbers drop the `.0`.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Present(Value::Text(s)) => f.write_str(s),
            Cell::Present(Value::Number(v)) if !v.is_finite() => Ok(()),
            Cell::Present(Value::Number(v)) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
        }
    }
}

// ── Series ───────────────────────────────────────────────────────────────

/// An ordered label → cell mapping with an optional index name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    index_name: Option<String>,
    entries: IndexMap<String, Cell>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from `(label, cell)` pairs. A repeated label keeps its
    /// first position and takes the last value.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        Self {
            index_name: None,
            entries: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn get(&self, label: &str) -> Option<&Cell> {
        self.entries.get(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A one-column table: rows are this series' labels (row-index name =
    /// this series' index name), the single column is `column_label`.
    pub fn to_column_table(&self, column_label: impl Into<String>) -> Table {
        Table {
            row_name: self.index_name.clone(),
            column_name: None,
            columns: vec![column_label.into()],
            rows: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), vec![v.clone()]))
                .collect(),
        }
    }
}

// ── Table ────────────────────────────────────────────────────────────────

/// A two-dimensional labeled table.
///
/// Columns are an ordered label list (with an optional column-index name);
/// rows map a unique label to cells aligned with the columns (with an
/// optional row-index name).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    row_name: Option<String>,
    column_name: Option<String>,
    columns: Vec<String>,
    rows: IndexMap<String, Vec<Cell>>,
}

impl Table {
    /// Stack series as rows. Columns are the union of the series labels in
    /// first-seen order; a label absent from a series becomes `Missing`.
    pub fn stack<'a, I, S>(rows: I) -> Result<Table, ReportError>
    where
        I: IntoIterator<Item = (S, &'a Series)>,
        S: Into<String>,
    {
        let rows: Vec<(String, &Series)> = rows.into_iter().map(|(k, s)| (k.into(), s)).collect();

        let mut columns: Vec<String> = Vec::new();
        for (_, series) in &rows {
            for label in series.labels() {
                if !columns.iter().any(|c| c == label) {
                    columns.push(label.to_string());
                }
            }
        }

        let mut out: IndexMap<String, Vec<Cell>> = IndexMap::with_capacity(rows.len());
        for (label, series) in rows {
            if out.contains_key(&label) {
                return Err(ReportError::DuplicateRow { label });
            }
            let cells = columns
                .iter()
                .map(|c| series.get(c).cloned().unwrap_or_default())
                .collect();
            out.insert(label, cells);
        }

        Ok(Table {
            row_name: None,
            column_name: None,
            columns,
            rows: out,
        })
    }

    pub fn with_row_name(mut self, name: impl Into<String>) -> Self {
        self.row_name = Some(name.into());
        self
    }

    pub fn with_column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    pub fn row_name(&self) -> Option<&str> {
        self.row_name.as_deref()
    }

    pub fn column_name(&self) -> Option<&str> {
        self.column_name.as_deref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `(row count, column count)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Cell])> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn row(&self, label: &str) -> Option<&[Cell]> {
        self.rows.get(label).map(Vec::as_slice)
    }

    pub fn get(&self, row: &str, column: &str) -> Option<&Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|cells| cells.get(idx))
    }

    /// Swap rows and columns, including the two index names.
    pub fn transpose(&self) -> Result<Table, ReportError> {
        let mut rows: IndexMap<String, Vec<Cell>> = IndexMap::with_capacity(self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            if rows.contains_key(column) {
                return Err(ReportError::DuplicateRow {
                    label: column.clone(),
                });
            }
            let cells = self
                .rows
                .values()
                .map(|r| r.get(i).cloned().unwrap_or_default())
                .collect();
            rows.insert(column.clone(), cells);
        }

        Ok(Table {
            row_name: self.column_name.clone(),
            column_name: self.row_name.clone(),
            columns: self.rows.keys().cloned().collect(),
            rows,
        })
    }

    /// A copy without the row `label`.
    pub fn drop_row(&self, label: &str) -> Result<Table, ReportError> {
        if !self.rows.contains_key(label) {
            return Err(ReportError::UnknownRow {
                label: label.to_string(),
            });
        }
        let mut out = self.clone();
        out.rows.shift_remove(label);
        Ok(out)
    }

    /// A copy with every column label passed through `rename`.
    pub fn rename_columns<F>(&self, rename: F) -> Table
    where
        F: Fn(&str) -> String,
    {
        Table {
            columns: self.columns.iter().map(|c| rename(c)).collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weeks() -> Series {
        Series::from_pairs([
            ("1", Cell::number(3.0)),
            ("2", Cell::Missing),
            ("3", Cell::number(5.0)),
        ])
        .with_index_name("week")
    }

    #[test]
    fn cell_display() {
        assert_eq!(Cell::number(3.0).to_string(), "3");
        assert_eq!(Cell::number(2.5).to_string(), "2.5");
        assert_eq!(Cell::text("B1").to_string(), "B1");
        assert_eq!(Cell::Missing.to_string(), "");
    }

    #[test]
    fn non_finite_numbers_are_missing() {
        assert_eq!(Cell::from(f64::NAN), Cell::Missing);
        assert_eq!(Cell::number(f64::INFINITY), Cell::Missing);
        assert_eq!(Cell::from(Some(f64::NEG_INFINITY)), Cell::Missing);

        let raw = Cell::Present(Value::Number(f64::NAN));
        assert_eq!(raw.to_string(), "");
        assert_eq!(raw.as_number(), None);
    }

    #[test]
    fn cell_json_uses_null_for_missing() {
        let cells: Vec<Cell> = serde_json::from_str(r#"[1, null, "A2"]"#).unwrap();
        assert_eq!(cells, vec![Cell::number(1.0), Cell::Missing, Cell::text("A2")]);
        assert_eq!(serde_json::to_string(&cells).unwrap(), r#"[1.0,null,"A2"]"#);
    }

    #[test]
    fn column_table_then_transpose_gives_one_row() {
        let t = weeks().to_column_table("units").transpose().unwrap();
        assert_eq!(t.shape(), (1, 3));
        assert_eq!(t.column_name(), Some("week"));
        assert_eq!(t.row_name(), None);
        assert_eq!(t.columns(), ["1", "2", "3"]);
        assert_eq!(t.get("units", "3"), Some(&Cell::number(5.0)));
        assert_eq!(t.get("units", "2"), Some(&Cell::Missing));
    }

    #[test]
    fn stack_unions_labels_and_fills_missing() {
        let level = Series::from_pairs([("grammar", Cell::text("B1")), ("reading", Cell::text("A2"))]);
        let units = Series::from_pairs([("grammar", Cell::number(4.0)), ("listening", Cell::number(2.0))]);
        let t = Table::stack([("level", &level), ("units", &units)]).unwrap();

        assert_eq!(t.columns(), ["grammar", "reading", "listening"]);
        assert_eq!(t.get("level", "listening"), Some(&Cell::Missing));
        assert_eq!(t.get("units", "reading"), Some(&Cell::Missing));
        assert_eq!(t.get("units", "grammar"), Some(&Cell::number(4.0)));
    }

    #[test]
    fn stack_rejects_duplicate_row_labels() {
        let s = weeks();
        let err = Table::stack([("units", &s), ("units", &s)]).unwrap_err();
        assert!(matches!(err, ReportError::DuplicateRow { label } if label == "units"));
    }

    #[test]
    fn drop_row_leaves_original_untouched() {
        let s = weeks();
        let t = Table::stack([("level", &s), ("units", &s)]).unwrap();
        let dropped = t.drop_row("level").unwrap();

        assert_eq!(dropped.shape(), (1, 3));
        assert!(dropped.row("level").is_none());
        assert_eq!(t.shape(), (2, 3));
    }

    #[test]
    fn drop_unknown_row_fails() {
        let t = weeks().to_column_table("units");
        assert!(matches!(
            t.drop_row("level"),
            Err(ReportError::UnknownRow { .. })
        ));
    }

    #[test]
    fn rename_columns_is_pure() {
        let t = weeks().to_column_table("units").transpose().unwrap();
        let renamed = t.rename_columns(|c| format!("w{c}"));
        assert_eq!(renamed.columns(), ["w1", "w2", "w3"]);
        assert_eq!(t.columns(), ["1", "2", "3"]);
        assert_eq!(renamed.get("units", "w1"), Some(&Cell::number(3.0)));
    }
}
