use crate::jobs::{Month, Row, UnifiedDataset, MONTH_COLUMN};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, QueryResult, Statement};
use serde_json::{Number, Value};

/// Job-log columns that some month tables carry in lower case.
const CANONICAL_COLUMNS: [&str; 5] = ["AH_RUNTIME", "AH_ERT", "AH_MSGNR", "AH_STYPE", "AH_OTYPE"];

/// Read every month table into one dataset.
///
/// A month whose table is missing or unreadable is logged and skipped; this
/// never fails, and returns an empty dataset only when no month could be read.
pub async fn load_jobs(db: &DatabaseConnection) -> UnifiedDataset {
    let mut dataset = UnifiedDataset::new();
    let mut loaded = 0usize;

    for month in Month::ALL {
        match load_month(db, month).await {
            Ok(rows) => {
                loaded += 1;
                dataset.extend_rows(rows);
            }
            Err(e) => {
                tracing::warn!(month = %month, error = %e, "Skipping month table");
            }
        }
    }

    tracing::debug!(months = loaded, rows = dataset.len(), "Loaded job data");
    dataset
}

/// Read one month table and normalise its rows.
///
/// Month tables are written by another process and their declared column
/// types are unreliable (`NUMERIC`, or none at all), so every cell is decoded
/// by the storage class of the value it actually holds.
pub async fn load_month(db: &DatabaseConnection, month: Month) -> Result<Vec<Row>, DbErr> {
    let labels = column_labels(db, month).await?;
    if labels.is_empty() {
        return Err(DbErr::Custom(format!("no such table: {month}")));
    }

    let backend = db.get_database_backend();
    let sql = select_by_storage_class(month, &labels);
    let results = db.query_all(Statement::from_string(backend, sql)).await?;

    results
        .iter()
        .map(|result| {
            let mut row = Row::new();
            for (idx, label) in labels.iter().enumerate() {
                row.insert(label.clone(), read_cell(result, idx)?);
            }
            Ok(normalize_row(row, month))
        })
        .collect()
}

/// Column labels of a month table in declaration order; empty when there is
/// no such table.
async fn column_labels(db: &DatabaseConnection, month: Month) -> Result<Vec<String>, DbErr> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(
        backend,
        "SELECT name FROM pragma_table_info(?) ORDER BY cid",
        [month.as_str().into()],
    );

    db.query_all(stmt)
        .await?
        .iter()
        .map(|result| result.try_get::<String>("", "name"))
        .collect()
}

/// `SELECT typeof(c0) AS t0, c0 AS v0, ...` over every column of the table.
fn select_by_storage_class(month: Month, labels: &[String]) -> String {
    let projection = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let column = quote_ident(label);
            format!("typeof({column}) AS \"t{idx}\", {column} AS \"v{idx}\"")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT {} FROM {}", projection, quote_ident(month.as_str()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn read_cell(result: &QueryResult, idx: usize) -> Result<Value, DbErr> {
    let storage_class: String = result.try_get("", &format!("t{idx}"))?;
    let column = format!("v{idx}");

    let value = match storage_class.as_str() {
        "integer" => Value::from(result.try_get::<i64>("", &column)?),
        "real" => Number::from_f64(result.try_get::<f64>("", &column)?)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "text" => Value::String(result.try_get::<String>("", &column)?),
        "blob" => Value::from(result.try_get::<Vec<u8>>("", &column)?),
        _ => Value::Null,
    };
    Ok(value)
}

/// Strip stray quotes from column labels, map the lower-case job-log labels
/// onto their canonical names and tag the row with its month.
///
/// Labels keep their position; a lower-case label is renamed only when the
/// table has no canonical column of that name.
pub fn normalize_row(row: Row, month: Month) -> Row {
    let cells: Vec<(String, Value)> = row
        .into_iter()
        .map(|(label, value)| (label.replace('"', ""), value))
        .collect();

    let present: Vec<&str> = CANONICAL_COLUMNS
        .into_iter()
        .filter(|canonical| cells.iter().any(|(label, _)| label == canonical))
        .collect();

    let mut out = Row::new();
    for (label, value) in cells {
        let renamed = CANONICAL_COLUMNS.into_iter().find(|canonical| {
            !present.contains(canonical) && canonical.to_ascii_lowercase() == label
        });
        match renamed {
            Some(canonical) => out.insert(canonical.to_string(), value),
            None => out.insert(label, value),
        };
    }

    out.insert(
        MONTH_COLUMN.to_string(),
        Value::String(month.as_str().to_string()),
    );
    out
}
