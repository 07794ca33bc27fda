//! CSV ingestion and table shaping with Polars.
//!
//! Uploads arrive as raw bytes and leave as [`DataFrame`]s; everything the
//! rest of the pipeline needs from a table (schema check, feature matrix,
//! cluster column, preview, CSV export) lives here.

use std::io::Cursor;

use ndarray::Array2;
use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Columns an upload must contain to be scored, in feature order.
pub const REQUIRED_COLUMNS: [&str; 2] = ["Annual Income (k$)", "Spending Score (1-100)"];

/// Name of the column appended with predicted cluster labels.
pub const CLUSTER_COLUMN: &str = "Cluster";

/// How many rows table previews show.
pub const PREVIEW_ROWS: usize = 5;

/// First rows of a table rendered to plain strings, plus the full row count.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePreview {
    /// Column names in table order.
    pub columns: Vec<String>,
    /// One entry per previewed row, cells in column order.
    pub rows: Vec<Vec<String>>,
    /// Height of the table the preview was taken from.
    pub total_rows: usize,
}

/// Parse uploaded bytes as a headered CSV table.
///
/// Any malformed input (empty body, broken encoding, inconsistent rows)
/// comes back as [`PipelineError::Parse`].
pub fn read_csv(bytes: &[u8]) -> Result<DataFrame> {
    if bytes.is_empty() {
        return Err(PipelineError::Parse("the file is empty".to_string()));
    }
    // Polars decodes lossily, turning binary blobs into one-column tables
    // of replacement characters. Reject broken encodings before it can.
    if std::str::from_utf8(bytes).is_err() {
        return Err(PipelineError::Parse("the file is not valid UTF-8".to_string()));
    }

    CsvReader::new(Cursor::new(bytes))
        .has_header(true)
        .finish()
        .map_err(|err| PipelineError::Parse(err.to_string()))
}

/// Required columns absent from `df`, in [`REQUIRED_COLUMNS`] order.
///
/// Matching is exact; `"annual income (k$)"` does not count.
pub fn missing_required_columns(df: &DataFrame) -> Vec<String> {
    let present = df.get_column_names();
    REQUIRED_COLUMNS
        .iter()
        .filter(|name| !present.contains(name))
        .map(|name| (*name).to_string())
        .collect()
}

/// Extract the required columns as a row-major `(n_rows, 2)` matrix of
/// raw (unscaled) values, preserving row order.
///
/// Non-numeric cells, empty cells, and non-finite values are reported as
/// [`PipelineError::Model`] naming the offending column. Columns must
/// already be present; call [`missing_required_columns`] first.
pub fn feature_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for name in REQUIRED_COLUMNS {
        columns.push(numeric_column(df, name)?);
    }

    let n_rows = df.height();
    let mut data = Vec::with_capacity(n_rows * REQUIRED_COLUMNS.len());
    for i in 0..n_rows {
        for column in &columns {
            data.push(column[i]);
        }
    }

    Array2::from_shape_vec((n_rows, REQUIRED_COLUMNS.len()), data)
        .map_err(|err| PipelineError::Internal(err.to_string()))
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .map_err(|err| PipelineError::Internal(err.to_string()))?;

    // Non-strict cast: cells that cannot be read as numbers become null.
    let cast = series
        .cast(&DataType::Float64)
        .map_err(|_| non_numeric(name))?;
    let values = cast.f64().map_err(|_| non_numeric(name))?;

    if values.null_count() > 0 {
        return Err(non_numeric(name));
    }

    let column: Vec<f64> = values.into_no_null_iter().collect();
    if column.iter().any(|v| !v.is_finite()) {
        return Err(non_numeric(name));
    }
    Ok(column)
}

fn non_numeric(name: &str) -> PipelineError {
    PipelineError::Model(format!("column {name:?} contains non-numeric values"))
}

/// Return a copy of `df` with a [`CLUSTER_COLUMN`] of predicted labels
/// appended. Original columns and row order are untouched.
pub fn with_cluster_column(df: &DataFrame, labels: &[u32]) -> Result<DataFrame> {
    if labels.len() != df.height() {
        return Err(PipelineError::Internal(format!(
            "{} labels for {} rows",
            labels.len(),
            df.height()
        )));
    }

    let mut out = df.clone();
    out.with_column(Series::new(CLUSTER_COLUMN, labels))
        .map_err(|err| PipelineError::Internal(err.to_string()))?;
    Ok(out)
}

/// Serialize a table to CSV bytes with a header row.
pub fn to_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut out = df.clone();
    CsvWriter::new(&mut buf)
        .finish(&mut out)
        .map_err(|err| PipelineError::Internal(err.to_string()))?;
    Ok(buf)
}

/// Render the first `limit` rows of a table for display.
pub fn preview(df: &DataFrame, limit: usize) -> TablePreview {
    let head = df.head(Some(limit));

    let columns = head
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut rows = Vec::with_capacity(head.height());
    for i in 0..head.height() {
        let mut row = Vec::with_capacity(head.width());
        for series in head.get_columns() {
            let value = series.get(i).unwrap_or(AnyValue::Null);
            row.push(cell_text(value));
        }
        rows.push(row);
    }

    TablePreview {
        columns,
        rows,
        total_rows: df.height(),
    }
}

/// Plain-text cell rendering. String cells are shown without the quotes
/// that `AnyValue`'s `Display` adds.
fn cell_text(value: AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Utf8(text) => text.to_string(),
        AnyValue::Utf8Owned(text) => text.to_string(),
        other => other.to_string(),
    }
}
