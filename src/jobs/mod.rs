//! Job execution statistics read from the twelve month tables (`Jan`..`Dec`).
//!
//! [`loader::load_jobs`] builds a [`UnifiedDataset`] from whatever month tables
//! are readable, and [`views`] turns it into chart and summary-table payloads.

pub mod loader;
pub mod views;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Label of the column every row is tagged with by the loader.
pub const MONTH_COLUMN: &str = "month";

/// One row of a month table: column label -> cell.
pub type Row = Map<String, Value>;

/// Month codes, which double as the source table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    /// Calendar order.
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }

    /// Month named by a cell, if it holds one of the twelve codes exactly.
    pub fn from_cell(value: &Value) -> Option<Month> {
        value.as_str().and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMonth(pub String);

impl fmt::Display for UnknownMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown month code `{}`", self.0)
    }
}

impl std::error::Error for UnknownMonth {}

impl FromStr for Month {
    type Err = UnknownMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Month::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMonth(s.to_string()))
    }
}

/// Concatenation of every readable month table.
///
/// Columns are the union of all frames' columns in first-seen order. A row
/// that lacks one of them reads as null for that column, the way an outer
/// concat fills missing cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedDataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl UnifiedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows, keeping their order and widening the column set.
    pub fn extend_rows(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            for label in row.keys() {
                if !self.columns.iter().any(|c| c == label) {
                    self.columns.push(label.clone());
                }
            }
            self.rows.push(row);
        }
    }

    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let mut dataset = Self::new();
        dataset.extend_rows(rows);
        dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.columns.iter().any(|c| c == label)
    }
}

/// Cell of `row` under `label`, null when the row has no such column.
pub fn cell<'a>(row: &'a Row, label: &str) -> &'a Value {
    row.get(label).unwrap_or(&Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().expect("row must be an object")
    }

    #[test]
    fn test_month_parsing_is_exact() {
        assert_eq!("Mar".parse::<Month>(), Ok(Month::Mar));
        assert!("mar".parse::<Month>().is_err());
        assert!("March".parse::<Month>().is_err());
        assert_eq!(Month::from_cell(&json!("Dec")), Some(Month::Dec));
        assert_eq!(Month::from_cell(&json!(12)), None);
    }

    #[test]
    fn test_month_order_and_serialization() {
        let codes: Vec<&str> = Month::ALL.iter().map(Month::as_str).collect();
        assert_eq!(
            codes,
            ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
        );
        assert!(Month::Jan < Month::Dec);
        assert_eq!(serde_json::to_value(Month::Sep).unwrap(), json!("Sep"));
    }

    #[test]
    fn test_dataset_column_union() {
        let ds = UnifiedDataset::from_rows(vec![
            row(json!({"AH_RUNTIME": 1, "month": "Jan"})),
            row(json!({"AH_ERT": 2, "month": "Feb"})),
        ]);

        assert_eq!(ds.len(), 2);
        assert!(ds.has_column("AH_RUNTIME"));
        assert!(ds.has_column("AH_ERT"));
        assert!(ds.has_column(MONTH_COLUMN));
        assert_eq!(cell(&ds.rows()[1], "AH_RUNTIME"), &Value::Null);
        assert_eq!(cell(&ds.rows()[1], "AH_ERT"), &json!(2));
    }

    #[test]
    fn test_dataset_columns_in_first_seen_order() {
        let ds = UnifiedDataset::from_rows(vec![
            row(json!({"AH_STYPE": "A", "AH_RUNTIME": 1, "month": "Jan"})),
            row(json!({"AH_ERT": 2, "AH_STYPE": "B", "month": "Feb"})),
        ]);

        assert_eq!(ds.columns(), ["AH_STYPE", "AH_RUNTIME", "month", "AH_ERT"]);
    }
}
