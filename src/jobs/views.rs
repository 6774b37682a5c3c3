//! Read-only projections of a [`UnifiedDataset`] shaped for the dashboard.
//!
//! Both views emit Google-Charts-style tables: a header row followed by data
//! rows, keyed by month code. Cells are coerced leniently: numbers pass
//! through, booleans count as 1/0, strings are parsed after trimming, and
//! everything else is treated as missing.

use crate::jobs::{cell, Month, Row, UnifiedDataset, MONTH_COLUMN};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Starter types that never show up in the summary tables.
pub const EXCLUDED_STARTER_TYPES: [&str; 5] = ["", "JAVA API", "OBJ", "<ONCE>", "<PERIOD>"];

const PIE_HEADER: [&str; 2] = ["Status", "Count"];
const EXECUTION_TIME_HEADER: [&str; 3] = ["Month", "Execution Time", "Estimated Time"];
const SUMMARY_HEADER: [&str; 3] = ["Starter Type", "Job Type", "Total Jobs"];

/// Why a view could not be computed. Serialises as `{"error": "<message>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("No data available")]
    NoData,
    #[error("Month column is missing in job data.")]
    MissingMonthColumn,
}

impl Serialize for ViewError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("error", &self.to_string())?;
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobStatus {
    Done,
    Error,
}

impl JobStatus {
    /// Only a status code of exactly 0 is a success.
    pub fn from_msgnr(code: i64) -> Self {
        if code == 0 {
            JobStatus::Done
        } else {
            JobStatus::Error
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub status: JobStatus,
    pub count: u64,
}

/// Status counts of one month, most frequent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PieChart {
    pub counts: Vec<StatusCount>,
}

impl PieChart {
    pub fn count_of(&self, status: JobStatus) -> u64 {
        self.counts
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

impl Serialize for PieChart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_table(
            serializer,
            &PIE_HEADER,
            self.counts.iter().map(|c| (c.status, c.count)),
        )
    }
}

/// Mean actual and estimated runtime of one month.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTime {
    pub month: Month,
    pub runtime: f64,
    pub estimate: f64,
}

/// Always twelve entries, in calendar order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTimeSeries(pub Vec<ExecutionTime>);

impl Serialize for ExecutionTimeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_table(
            serializer,
            &EXECUTION_TIME_HEADER,
            self.0.iter().map(|e| (e.month, e.runtime, e.estimate)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub pie_charts: BTreeMap<Month, PieChart>,
    pub execution_time: ExecutionTimeSeries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub starter_type: String,
    pub job_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl Serialize for SummaryTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_table(
            serializer,
            &SUMMARY_HEADER,
            self.rows
                .iter()
                .map(|r| (r.starter_type.as_str(), r.job_type.as_str(), r.count)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryTables {
    pub tables: BTreeMap<Month, SummaryTable>,
}

fn serialize_table<S, T, I>(serializer: S, header: &[&str], rows: I) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
    I: ExactSizeIterator<Item = T>,
{
    let mut seq = serializer.serialize_seq(Some(rows.len() + 1))?;
    seq.serialize_element(header)?;
    for row in rows {
        seq.serialize_element(&row)?;
    }
    seq.end()
}

/// Numeric value of a cell, `None` when it is missing or not a number.
pub fn to_numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// `AH_MSGNR` as an integer; missing or non-numeric codes become -1.
pub fn coerce_msgnr(value: &Value) -> i64 {
    to_numeric(value).map(|n| n.trunc() as i64).unwrap_or(-1)
}

pub fn compute_chart_view(dataset: &UnifiedDataset) -> Result<ChartData, ViewError> {
    if dataset.is_empty() {
        return Err(ViewError::NoData);
    }
    if !dataset.has_column(MONTH_COLUMN) {
        return Err(ViewError::MissingMonthColumn);
    }

    #[derive(Default)]
    struct MonthTotals {
        statuses: Vec<StatusCount>,
        runtime: f64,
        estimate: f64,
        rows: u64,
    }

    let mut totals: BTreeMap<Month, MonthTotals> = BTreeMap::new();

    for row in dataset.rows() {
        let Some(month) = Month::from_cell(cell(row, MONTH_COLUMN)) else {
            continue;
        };
        let entry = totals.entry(month).or_default();

        entry.runtime += to_numeric(cell(row, "AH_RUNTIME")).unwrap_or(0.0);
        entry.estimate += to_numeric(cell(row, "AH_ERT")).unwrap_or(0.0);
        entry.rows += 1;

        let status = JobStatus::from_msgnr(coerce_msgnr(cell(row, "AH_MSGNR")));
        match entry.statuses.iter_mut().find(|c| c.status == status) {
            Some(c) => c.count += 1,
            None => entry.statuses.push(StatusCount { status, count: 1 }),
        }
    }

    let mut pie_charts = BTreeMap::new();
    let mut execution_time = Vec::with_capacity(Month::ALL.len());

    for month in Month::ALL {
        match totals.remove(&month) {
            Some(mut t) => {
                // Stable: ties keep first-seen order
                t.statuses.sort_by(|a, b| b.count.cmp(&a.count));
                pie_charts.insert(month, PieChart { counts: t.statuses });
                execution_time.push(ExecutionTime {
                    month,
                    runtime: t.runtime / t.rows as f64,
                    estimate: t.estimate / t.rows as f64,
                });
            }
            None => {
                pie_charts.insert(month, PieChart::default());
                execution_time.push(ExecutionTime {
                    month,
                    runtime: 0.0,
                    estimate: 0.0,
                });
            }
        }
    }

    Ok(ChartData {
        pie_charts,
        execution_time: ExecutionTimeSeries(execution_time),
    })
}

/// Trimmed, unquoted, upper-cased starter type. Null reads as the empty
/// string; non-text cells have no starter type and are left out of the summary.
pub fn normalize_starter_type(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.trim().trim_matches('"').to_uppercase()),
        _ => None,
    }
}

/// Job type as text with every quote removed and surrounding whitespace trimmed.
///
/// A null cell reads as `None` and a cell from a month whose table lacks the
/// column reads as `nan`, so neither merges with a blank job type.
pub fn normalize_job_type(value: Option<&Value>) -> String {
    let text = match value {
        None => "nan".to_string(),
        Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(other) => other.to_string(),
    };
    text.replace('"', "").trim().to_string()
}

/// Cell whose label matches `label` once upper-cased, `None` when the row
/// has no such column.
fn upper_cell<'a>(row: &'a Row, label: &str) -> Option<&'a Value> {
    row.get(label).or_else(|| {
        row.iter()
            .find(|(k, _)| k.to_uppercase() == label)
            .map(|(_, v)| v)
    })
}

fn row_month(row: &Row) -> Option<Month> {
    // The loader's tag wins over a source column that upper-cases to the same label
    match row.get(MONTH_COLUMN) {
        Some(tag) => Month::from_cell(tag),
        None => upper_cell(row, "MONTH").and_then(Month::from_cell),
    }
}

pub fn compute_summary_view(dataset: &UnifiedDataset) -> Result<SummaryTables, ViewError> {
    if dataset.is_empty() {
        return Err(ViewError::NoData);
    }
    if !dataset
        .columns()
        .iter()
        .any(|c| c.to_uppercase() == "MONTH")
    {
        return Err(ViewError::MissingMonthColumn);
    }

    // Key order is the output order: month, then job type, then starter type
    let mut groups: BTreeMap<(Month, String, String), u64> = BTreeMap::new();

    for row in dataset.rows() {
        let Some(month) = row_month(row) else {
            continue;
        };
        let starter_cell = upper_cell(row, "AH_STYPE").unwrap_or(&Value::Null);
        let Some(starter_type) = normalize_starter_type(starter_cell) else {
            continue;
        };
        if EXCLUDED_STARTER_TYPES.contains(&starter_type.as_str()) {
            continue;
        }
        let job_type = normalize_job_type(upper_cell(row, "AH_OTYPE"));

        *groups.entry((month, job_type, starter_type)).or_insert(0) += 1;
    }

    let mut tables: BTreeMap<Month, SummaryTable> = Month::ALL
        .into_iter()
        .map(|m| (m, SummaryTable::default()))
        .collect();

    for ((month, job_type, starter_type), count) in groups {
        if let Some(table) = tables.get_mut(&month) {
            table.rows.push(SummaryRow {
                starter_type,
                job_type,
                count,
            });
        }
    }

    Ok(SummaryTables { tables })
}
