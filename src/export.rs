//! Record Export
//!
//! Client-side filtering of fetched records and rendering them as CSV,
//! JSON or NDJSON for download.

use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

use crate::api::Record;

/// Output format for exported records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Ndjson,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Ndjson => "ndjson",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "ndjson" => Ok(ExportFormat::Ndjson),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unknown export format: {0}")]
    UnknownFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output was not valid UTF-8")]
    Utf8,
}

/// Keep records whose scalar values contain `query` (case-insensitive).
/// Nested objects and arrays are searched too. An empty query keeps all.
pub fn filter_records<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| value_matches(r, &needle))
        .collect()
}

fn value_matches(value: &Value, needle: &str) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => b.to_string() == needle,
        Value::Number(n) => n.to_string().contains(needle),
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| value_matches(v, needle)),
        Value::Object(map) => map.values().any(|v| value_matches(v, needle)),
    }
}

/// Union of top-level keys, in the order they are first seen
pub fn columns_of<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        if let Value::Object(map) = record {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested) => nested.to_string(),
    }
}

/// Render records as CSV.
///
/// Uses `columns` when given, otherwise every top-level key. Nested values
/// are written as compact JSON; missing and null values as empty cells.
pub fn to_csv(records: &[&Record], columns: Option<&[String]>) -> Result<String, ExportError> {
    let columns = match columns {
        Some(cols) => cols.to_vec(),
        None => columns_of(records.iter().copied()),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        let row = columns.iter().map(|c| cell(record.get(c)));
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|_| ExportError::Utf8)
}

/// Render records in the requested format
pub fn render(records: &[&Record], format: ExportFormat, columns: Option<&[String]>) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(records, columns),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        ExportFormat::Ndjson => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// Default download name, e.g. `orders_export_20240131_120000.csv`
pub fn export_filename(collection: &str, format: ExportFormat) -> String {
    format!(
        "{}_export_{}.{}",
        collection,
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}
